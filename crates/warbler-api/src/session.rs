use anyhow::anyhow;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use warbler_db::models::UserRow;
use warbler_types::api::SessionClaims;

pub const SESSION_COOKIE: &str = "warbler_session";

/// Request-scoped login state, resolved once per request by `load_session`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<UserRow>,
}

/// The logged-in user on routes behind `require_login`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

pub fn issue_token(secret: &str, user_id: Uuid, lifetime_days: i64) -> anyhow::Result<String> {
    let expires_at = TimeDelta::try_days(lifetime_days)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| anyhow!("Session lifetime of {} days is out of range", lifetime_days))?;
    let claims = SessionClaims {
        curr_user: user_id,
        exp: expires_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// `None` for tokens that are malformed, forged or expired.
pub fn decode_token(secret: &str, token: &str) -> Option<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

pub fn login(jar: CookieJar, token: String) -> CookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
