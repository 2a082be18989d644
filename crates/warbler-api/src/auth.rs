use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use warbler_db::Database;
use warbler_db::models::UserRow;
use warbler_types::api::{Flash, FlashCategory, FormView};
use warbler_types::forms::{FieldErrors, LoginForm, SignupForm};

use crate::credentials::{self, Hasher, Signup, SignupError};
use crate::error::ApiError;
use crate::session;
use crate::views::{self, page, page_flashed, redirect_flashed};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub session_days: i64,
    pub hasher: Hasher,
}

/// Run blocking database work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(format!("blocking task failed: {}", e))
        })
}

/// Write the session cookie for `user`.
fn log_in(state: &AppState, jar: CookieJar, user: &UserRow) -> Result<CookieJar, ApiError> {
    let user_id = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(format!("Corrupt user id '{}': {}", user.id, e)))?;
    let token = session::issue_token(&state.session_secret, user_id, state.session_days)
        .map_err(|e| ApiError::Internal(format!("Failed to issue session token: {}", e)))?;
    Ok(session::login(jar, token))
}

fn signup_view(form: &SignupForm, errors: FieldErrors) -> FormView {
    FormView {
        title: "Join Warbler today.",
        submit: "Sign me up!",
        fields: SignupForm::FIELDS.to_vec(),
        values: form.values(),
        errors,
    }
}

fn login_view(form: &LoginForm, errors: FieldErrors) -> FormView {
    FormView {
        title: "Welcome back.",
        submit: "Log in",
        fields: LoginForm::FIELDS.to_vec(),
        values: form.values(),
        errors,
    }
}

/// GET /signup
pub async fn signup_form(jar: CookieJar) -> Response {
    page(jar, "signup", signup_view(&SignupForm::default(), FieldErrors::default()))
}

/// POST /signup — create the account and log it in.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    if let Err(errors) = form.validate() {
        return Ok(page(jar, "signup", signup_view(&form, errors)));
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let password = form.password.clone();
    let image_url = warbler_types::forms::non_blank(&form.image_url).map(str::to_string);

    let result = blocking(&state, move |s| {
        credentials::signup(
            &s.db,
            &s.hasher,
            Signup {
                username: &username,
                email: &email,
                password: Some(&password),
                image_url: image_url.as_deref(),
            },
        )
    })
    .await?;

    match result {
        Ok(user) => {
            info!("New user signed up: {}", user.username);
            let jar = log_in(&state, jar, &user)?;
            Ok(views::redirect(jar, "/"))
        }
        Err(err @ SignupError::Taken(_)) => Ok(page_flashed(
            jar,
            Flash::new(FlashCategory::Danger, err.to_string()),
            "signup",
            signup_view(&form, FieldErrors::default()),
        )),
        Err(SignupError::EmptyPassword) => {
            let mut errors = FieldErrors::default();
            errors.add("password", "This field is required.");
            Ok(page(jar, "signup", signup_view(&form, errors)))
        }
        Err(SignupError::Storage(e)) => Err(ApiError::Database(e)),
    }
}

/// GET /login
pub async fn login_form(jar: CookieJar) -> Response {
    page(jar, "login", login_view(&LoginForm::default(), FieldErrors::default()))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if let Err(errors) = form.validate() {
        return Ok(page(jar, "login", login_view(&form, errors)));
    }

    let username = form.username.trim().to_string();
    let password = form.password.clone();
    let user = blocking(&state, move |s| {
        credentials::authenticate(&s.db, &s.hasher, &username, &password)
    })
    .await??;

    match user {
        Some(user) => {
            let jar = log_in(&state, jar, &user)?;
            Ok(redirect_flashed(
                jar,
                Flash::new(FlashCategory::Success, format!("Hello, {}!", user.username)),
                "/",
            ))
        }
        None => Ok(page_flashed(
            jar,
            Flash::new(FlashCategory::Danger, "Invalid credentials."),
            "login",
            login_view(&form, FieldErrors::default()),
        )),
    }
}

/// GET /logout
pub async fn logout(jar: CookieJar) -> Response {
    redirect_flashed(
        session::logout(jar),
        Flash::new(FlashCategory::Success, "You have successfully logged out."),
        "/login",
    )
}
