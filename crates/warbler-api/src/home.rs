use axum::{Extension, extract::State, response::Response};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use warbler_types::api::{HomeView, LandingView};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::session::Session;
use crate::views::{self, page};

pub const TIMELINE_LIMIT: u32 = 100;

/// GET / — the timeline when logged in, the landing page otherwise.
pub async fn home(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let Some(user) = session.user else {
        return Ok(page(
            jar,
            "landing",
            LandingView {
                headline: "What's Happening?",
                signup_url: "/signup",
                login_url: "/login",
            },
        ));
    };

    let id = user.id.clone();
    let (rows, liked) = blocking(&state, move |s| {
        let rows = s.db.timeline(&id, TIMELINE_LIMIT)?;
        let liked = s.db.liked_message_ids(&id)?;
        Ok::<_, anyhow::Error>((rows, liked))
    })
    .await??;

    Ok(page(
        jar,
        "home",
        HomeView {
            user: views::user_summary(&user),
            messages: views::messages(&rows),
            liked_message_ids: liked.iter().filter_map(|id| id.parse::<Uuid>().ok()).collect(),
        },
    ))
}
