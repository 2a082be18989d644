//! Typed form inputs and their validation.
//!
//! Each form is a plain struct deserialized from a urlencoded body plus a pure
//! `validate` function. Missing fields deserialize as empty strings so that an
//! absent field reports the same error as a blank one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::MESSAGE_MAX_CHARS;

pub const PASSWORD_MIN_CHARS: usize = 6;

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Textarea,
    Url,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind,
        required,
    }
}

/// Validation failures keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn require(errors: &mut FieldErrors, name: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(name, REQUIRED);
    }
}

fn min_chars(errors: &mut FieldErrors, name: &str, value: &str, min: usize) {
    if value.chars().count() < min {
        errors.add(name, format!("Field must be at least {} characters long.", min));
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Control characters other than line breaks and tabs. SQLite stops
/// measuring text at a NUL, so these never reach storage.
fn has_control_chars(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

/// Treat a blank optional field as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// -- Signup --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

impl SignupForm {
    pub const FIELDS: [FieldSpec; 4] = [
        field("username", "Username", FieldKind::Text, true),
        field("email", "E-mail", FieldKind::Email, true),
        field("password", "Password", FieldKind::Password, true),
        field("image_url", "(Optional) Image URL", FieldKind::Url, false),
    ];

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "username", &self.username);
        require(&mut errors, "email", &self.email);
        if !self.email.trim().is_empty() && !looks_like_email(self.email.trim()) {
            errors.add("email", "Invalid email address.");
        }
        min_chars(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS);
        errors.into_result()
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert("username".to_string(), self.username.clone());
        values.insert("email".to_string(), self.email.clone());
        if let Some(url) = non_blank(&self.image_url) {
            values.insert("image_url".to_string(), url.to_string());
        }
        values
    }
}

// -- Login --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub const FIELDS: [FieldSpec; 2] = [
        field("username", "Username", FieldKind::Text, true),
        field("password", "Password", FieldKind::Password, true),
    ];

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "username", &self.username);
        min_chars(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS);
        errors.into_result()
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("username".to_string(), self.username.clone())])
    }
}

// -- Messages --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageForm {
    pub text: String,
}

impl MessageForm {
    pub const FIELDS: [FieldSpec; 1] = [field("text", "text", FieldKind::Textarea, true)];

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "text", &self.text);
        if has_control_chars(&self.text) {
            errors.add("text", "Text contains invalid characters.");
        }
        if self.text.chars().count() > MESSAGE_MAX_CHARS {
            errors.add(
                "text",
                format!("Field cannot be longer than {} characters.", MESSAGE_MAX_CHARS),
            );
        }
        errors.into_result()
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("text".to_string(), self.text.clone())])
    }
}

// -- Profile --

/// Blank fields keep the current value; only `password` is required, and it
/// must be the user's current password.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditProfileForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub password: String,
}

impl EditProfileForm {
    pub const FIELDS: [FieldSpec; 7] = [
        field("username", "New Username", FieldKind::Text, false),
        field("email", "New Email Address", FieldKind::Email, false),
        field("image_url", "New profile image url", FieldKind::Url, false),
        field("header_image_url", "New header image url", FieldKind::Url, false),
        field("bio", "Edit Bio", FieldKind::Textarea, false),
        field("location", "Location", FieldKind::Text, false),
        field("password", "Current Password", FieldKind::Password, true),
    ];

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if let Some(email) = non_blank(&self.email) {
            if !looks_like_email(email) {
                errors.add("email", "Invalid email address.");
            }
        }
        errors.into_result()
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("image_url", &self.image_url),
            ("header_image_url", &self.header_image_url),
            ("bio", &self.bio),
            ("location", &self.location),
        ]
        .into_iter()
        .filter_map(|(name, value)| non_blank(value).map(|v| (name.to_string(), v.to_string())))
        .collect()
    }
}
