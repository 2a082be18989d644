use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use thiserror::Error;
use tracing::error;

use warbler_types::api::{ErrorBody, Flash, FlashCategory};

use crate::flash;

pub const ACCESS_UNAUTHORIZED: &str = "Access unauthorized.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// No logged-in user, or the user/message addressed does not exist or
    /// may not be touched by the current user.
    #[error("access unauthorized")]
    Unauthorized,

    #[error("database error: {0:#}")]
    Database(#[from] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => {
                let jar = flash::push(
                    CookieJar::new(),
                    Flash::new(FlashCategory::Danger, ACCESS_UNAUTHORIZED),
                );
                (jar, Redirect::to("/")).into_response()
            }
            ApiError::Database(e) => {
                error!("Database error: {:#}", e);
                internal_error()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}
