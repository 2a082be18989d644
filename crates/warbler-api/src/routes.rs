use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::{load_session, require_login};
use crate::{home, messages, users};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(home::home))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/profile", get(users::profile_form).post(users::update_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/follow/{user_id}", post(users::follow))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/users/add_like/{message_id}", post(users::add_like))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/messages/new", get(messages::new_message_form).post(messages::create_message))
        .route("/messages/{message_id}", get(messages::show_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .layer(middleware::from_fn(require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
