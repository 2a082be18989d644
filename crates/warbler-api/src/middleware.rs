use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::session::{self, CurrentUser, SESSION_COOKIE, Session};

/// Session cookie first, then an `Authorization: Bearer` header.
fn session_token(req: &Request) -> Option<String> {
    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the session token into a `Session` extension on every request.
/// A token naming a user that no longer exists counts as logged out.
pub async fn load_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = session_token(&req).and_then(|token| session::decode_token(&state.session_secret, &token));

    let user = match claims {
        Some(claims) => {
            let id = claims.curr_user.to_string();
            let user = blocking(&state, move |s| s.db.get_user_by_id(&id)).await??;
            if user.is_none() {
                debug!("Session names unknown user {}", claims.curr_user);
            }
            user
        }
        None => None,
    };

    req.extensions_mut().insert(Session { user });
    Ok(next.run(req).await)
}

/// Gate a route on a logged-in user, exposing it as `CurrentUser`.
pub async fn require_login(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<Session>()
        .and_then(|session| session.user.clone())
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
