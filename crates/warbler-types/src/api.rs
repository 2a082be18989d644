use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::forms::{FieldErrors, FieldSpec};
use crate::models::{Message, UserProfile, UserSummary};

// -- Session --

/// Name of the claim that identifies the logged-in user in a session token.
pub const CURR_USER_KEY: &str = "curr_user";

/// Claims of the signed session token. Canonical definition lives here so the
/// API crate and any other consumer decode the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub curr_user: Uuid,
    pub exp: usize,
}

// -- Flash messages --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Danger,
}

/// One-shot notice carried across a redirect and shown on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

// -- Pages --

/// Envelope for every page the server returns: the view name, any pending
/// flashes, and the view's own fields flattened alongside.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub view: &'static str,
    pub flashes: Vec<Flash>,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Serialize)]
pub struct LandingView {
    pub headline: &'static str,
    pub signup_url: &'static str,
    pub login_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub user: UserSummary,
    pub messages: Vec<Message>,
    pub liked_message_ids: Vec<Uuid>,
}

/// A form description in place of a rendered template.
#[derive(Debug, Serialize)]
pub struct FormView {
    pub title: &'static str,
    pub submit: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Values echoed back into the form, never including passwords.
    pub values: BTreeMap<String, String>,
    pub errors: FieldErrors,
}

#[derive(Debug, Serialize)]
pub struct UserListView {
    pub query: Option<String>,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: UserProfile,
    pub messages: Vec<Message>,
    pub following_count: usize,
    pub followers_count: usize,
    pub likes_count: usize,
    /// Whether the logged-in user follows this profile.
    pub followed_by_you: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Following,
    Followers,
}

#[derive(Debug, Serialize)]
pub struct RelationView {
    pub user: UserProfile,
    pub relation: Relation,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct LikesView {
    pub user: UserProfile,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub message: Message,
    pub is_owner: bool,
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
