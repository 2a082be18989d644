//! Row-to-model conversion and the page/redirect responses every handler
//! builds on.

use axum::{
    Json,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use warbler_db::models::{MessageRow, UserRow};
use warbler_types::api::{Flash, Page};
use warbler_types::models::{Message, UserProfile, UserSummary};

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime() form, "YYYY-MM-DD HH:MM:SS", carries no timezone
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user_summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: parse_id(&row.id, "user"),
        username: row.username.clone(),
        image_url: row.image_url.clone(),
    }
}

pub fn user_profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: parse_id(&row.id, "user"),
        username: row.username.clone(),
        email: row.email.clone(),
        image_url: row.image_url.clone(),
        header_image_url: row.header_image_url.clone(),
        bio: row.bio.clone(),
        location: row.location.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn message(row: &MessageRow) -> Message {
    Message {
        id: parse_id(&row.id, "message"),
        text: row.text.clone(),
        created_at: parse_timestamp(&row.created_at),
        author: UserSummary {
            id: parse_id(&row.user_id, "user"),
            username: row.author_username.clone(),
            image_url: row.author_image_url.clone(),
        },
    }
}

pub fn messages(rows: &[MessageRow]) -> Vec<Message> {
    rows.iter().map(message).collect()
}

pub fn user_summaries(rows: &[UserRow]) -> Vec<UserSummary> {
    rows.iter().map(user_summary).collect()
}

/// Serve a page, draining any flashes queued by earlier redirects.
pub fn page<T: Serialize>(jar: CookieJar, view: &'static str, body: T) -> Response {
    let (jar, flashes) = crate::flash::take(jar);
    (jar, Json(Page { view, flashes, body })).into_response()
}

/// Serve a page with an extra flash raised by this very request.
pub fn page_flashed<T: Serialize>(jar: CookieJar, flash: Flash, view: &'static str, body: T) -> Response {
    let (jar, mut flashes) = crate::flash::take(jar);
    flashes.push(flash);
    (jar, Json(Page { view, flashes, body })).into_response()
}

pub fn redirect(jar: CookieJar, to: &str) -> Response {
    (jar, Redirect::to(to)).into_response()
}

pub fn redirect_flashed(jar: CookieJar, flash: Flash, to: &str) -> Response {
    (crate::flash::push(jar, flash), Redirect::to(to)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_in_both_stored_forms() {
        let a = parse_timestamp("2024-03-01T12:30:45.123Z");
        let b = parse_timestamp("2024-03-01 12:30:45");
        assert_eq!(a.timestamp(), b.timestamp());
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(parse_id("not-a-uuid", "user"), Uuid::default());
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
