use axum::{
    Extension, Form,
    extract::{Path, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;
use uuid::Uuid;

use warbler_types::api::{Flash, FlashCategory, FormView, MessageView};
use warbler_types::forms::{FieldErrors, MessageForm};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::session::CurrentUser;
use crate::views::{self, page, redirect_flashed};

fn compose_view(form: &MessageForm, errors: FieldErrors) -> FormView {
    FormView {
        title: "New message",
        submit: "Add my message!",
        fields: MessageForm::FIELDS.to_vec(),
        values: form.values(),
        errors,
    }
}

/// GET /messages/new
pub async fn new_message_form(jar: CookieJar) -> Response {
    page(jar, "new_message", compose_view(&MessageForm::default(), FieldErrors::default()))
}

/// POST /messages/new
pub async fn create_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<MessageForm>,
) -> Result<Response, ApiError> {
    if let Err(errors) = form.validate() {
        return Ok(page(jar, "new_message", compose_view(&form, errors)));
    }

    let message_id = Uuid::new_v4().to_string();
    let user_id = me.id.clone();
    let text = form.text.clone();
    blocking(&state, move |s| s.db.insert_message(&message_id, &user_id, &text)).await??;

    Ok(views::redirect(jar, &format!("/users/{}", me.id)))
}

/// GET /messages/{message_id}
pub async fn show_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(message_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let my_id = me.id.clone();
    let (row, liked) = blocking(&state, move |s| -> anyhow::Result<_> {
        let Some(row) = s.db.get_message(&message_id)? else {
            return Ok(None);
        };
        let liked = s.db.has_liked(&my_id, &row.id)?;
        Ok(Some((row, liked)))
    })
    .await??
    .ok_or(ApiError::Unauthorized)?;

    Ok(page(
        jar,
        "message",
        MessageView {
            message: views::message(&row),
            is_owner: row.user_id == me.id,
            liked,
        },
    ))
}

/// POST /messages/{message_id}/delete — only the author may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(message_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let my_id = me.id.clone();
    let deleted = blocking(&state, move |s| -> anyhow::Result<bool> {
        match s.db.get_message(&message_id)? {
            Some(row) if row.user_id == my_id => s.db.delete_message(&row.id),
            _ => Ok(false),
        }
    })
    .await??;

    if !deleted {
        return Err(ApiError::Unauthorized);
    }

    info!("{} deleted a message", me.username);
    Ok(redirect_flashed(
        jar,
        Flash::new(FlashCategory::Success, "Message deleted."),
        &format!("/users/{}", me.id),
    ))
}
