use std::collections::BTreeMap;

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use warbler_db::models::{UserRow, UserUpdate};
use warbler_db::unique_violation;
use warbler_types::api::{
    Flash, FlashCategory, FormView, LikesView, ProfileView, Relation, RelationView, UserListView,
};
use warbler_types::forms::{EditProfileForm, FieldErrors, non_blank};

use crate::auth::{AppState, blocking};
use crate::credentials::{self, taken_label};
use crate::error::ApiError;
use crate::session::{self, CurrentUser};
use crate::views::{self, page, page_flashed, redirect_flashed};

pub const PROFILE_MESSAGE_LIMIT: u32 = 100;

/// Look up a user named in the path. Unknown ids are treated as unauthorized.
pub(crate) async fn load_user(state: &AppState, id: String) -> Result<UserRow, ApiError> {
    blocking(state, move |s| s.db.get_user_by_id(&id))
        .await??
        .ok_or(ApiError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

/// GET /users?q=
pub async fn list_users(
    State(state): State<AppState>,
    Query(search): Query<UserSearch>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let query = non_blank(&search.q).map(str::to_string);
    let q = query.clone();
    let rows = blocking(&state, move |s| s.db.list_users(q.as_deref())).await??;

    Ok(page(
        jar,
        "users",
        UserListView {
            query,
            users: views::user_summaries(&rows),
        },
    ))
}

/// GET /users/{user_id}
pub async fn show_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let user = load_user(&state, user_id).await?;

    let id = user.id.clone();
    let my_id = me.id.clone();
    let view = blocking(&state, move |s| {
        let rows = s.db.messages_by_user(&id, PROFILE_MESSAGE_LIMIT)?;
        Ok::<_, anyhow::Error>((
            rows,
            s.db.count_following(&id)?,
            s.db.count_followers(&id)?,
            s.db.count_likes(&id)?,
            s.db.is_following(&my_id, &id)?,
        ))
    })
    .await??;
    let (rows, following_count, followers_count, likes_count, followed_by_you) = view;

    Ok(page(
        jar,
        "profile",
        ProfileView {
            user: views::user_profile(&user),
            messages: views::messages(&rows),
            following_count,
            followers_count,
            likes_count,
            followed_by_you,
        },
    ))
}

async fn relation_page(
    state: AppState,
    user_id: String,
    relation: Relation,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let user = load_user(&state, user_id).await?;

    let id = user.id.clone();
    let rows = blocking(&state, move |s| match relation {
        Relation::Following => s.db.list_following(&id),
        Relation::Followers => s.db.list_followers(&id),
    })
    .await??;

    let view = match relation {
        Relation::Following => "following",
        Relation::Followers => "followers",
    };
    Ok(page(
        jar,
        view,
        RelationView {
            user: views::user_profile(&user),
            relation,
            users: views::user_summaries(&rows),
        },
    ))
}

/// GET /users/{user_id}/following
pub async fn show_following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    relation_page(state, user_id, Relation::Following, jar).await
}

/// GET /users/{user_id}/followers
pub async fn show_followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    relation_page(state, user_id, Relation::Followers, jar).await
}

/// GET /users/{user_id}/likes
pub async fn show_likes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let user = load_user(&state, user_id).await?;

    let id = user.id.clone();
    let rows = blocking(&state, move |s| s.db.list_likes(&id)).await??;

    Ok(page(
        jar,
        "likes",
        LikesView {
            user: views::user_profile(&user),
            messages: views::messages(&rows),
        },
    ))
}

/// POST /users/follow/{user_id}
pub async fn follow(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let target = load_user(&state, user_id).await?;
    let back = format!("/users/{}/following", me.id);

    if target.id == me.id {
        return Ok(redirect_flashed(
            jar,
            Flash::new(FlashCategory::Info, "You cannot follow yourself."),
            &back,
        ));
    }

    let (my_id, target_id) = (me.id.clone(), target.id.clone());
    if blocking(&state, move |s| s.db.follow(&my_id, &target_id)).await?? {
        info!("{} followed {}", me.username, target.username);
    }

    Ok(views::redirect(jar, &back))
}

/// POST /users/stop-following/{user_id}
pub async fn stop_following(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let target = load_user(&state, user_id).await?;

    let (my_id, target_id) = (me.id.clone(), target.id.clone());
    blocking(&state, move |s| s.db.unfollow(&my_id, &target_id)).await??;

    Ok(views::redirect(jar, &format!("/users/{}/following", me.id)))
}

fn profile_view(values: BTreeMap<String, String>, errors: FieldErrors) -> FormView {
    FormView {
        title: "Edit Your Profile.",
        submit: "Edit this user!",
        fields: EditProfileForm::FIELDS.to_vec(),
        values,
        errors,
    }
}

fn current_values(user: &UserRow) -> BTreeMap<String, String> {
    let mut values = BTreeMap::from([
        ("username".to_string(), user.username.clone()),
        ("email".to_string(), user.email.clone()),
        ("image_url".to_string(), user.image_url.clone()),
        ("header_image_url".to_string(), user.header_image_url.clone()),
    ]);
    if let Some(bio) = &user.bio {
        values.insert("bio".to_string(), bio.clone());
    }
    if let Some(location) = &user.location {
        values.insert("location".to_string(), location.clone());
    }
    values
}

/// GET /users/profile
pub async fn profile_form(
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    jar: CookieJar,
) -> Response {
    page(jar, "edit_profile", profile_view(current_values(&me), FieldErrors::default()))
}

/// POST /users/profile — update after checking the current password.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, ApiError> {
    if let Err(errors) = form.validate() {
        return Ok(page(jar, "edit_profile", profile_view(form.values(), errors)));
    }

    let password = form.password.clone();
    let stored = me.password.clone();
    let password_ok = blocking(&state, move |_| credentials::verify_password(&password, &stored)).await??;
    if !password_ok {
        return Ok(page_flashed(
            jar,
            Flash::new(FlashCategory::Danger, "Wrong password, please try again."),
            "edit_profile",
            profile_view(form.values(), FieldErrors::default()),
        ));
    }

    let id = me.id.clone();
    let update_form = form.clone();
    let result = blocking(&state, move |s| {
        s.db.update_user(
            &id,
            &UserUpdate {
                username: non_blank(&update_form.username),
                email: non_blank(&update_form.email),
                image_url: non_blank(&update_form.image_url),
                header_image_url: non_blank(&update_form.header_image_url),
                bio: non_blank(&update_form.bio),
                location: non_blank(&update_form.location),
            },
        )
    })
    .await?;

    match result {
        Ok(Some(user)) => Ok(redirect_flashed(
            jar,
            Flash::new(FlashCategory::Success, "Profile updated."),
            &format!("/users/{}", user.id),
        )),
        Ok(None) => Err(ApiError::Unauthorized),
        Err(e) => match unique_violation(&e) {
            Some(field) => Ok(page_flashed(
                jar,
                Flash::new(FlashCategory::Danger, format!("{} already taken", taken_label(&field))),
                "edit_profile",
                profile_view(form.values(), FieldErrors::default()),
            )),
            None => Err(ApiError::Database(e)),
        },
    }
}

/// POST /users/delete — remove the account and end the session.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let id = me.id.clone();
    blocking(&state, move |s| s.db.delete_user(&id)).await??;
    info!("User deleted: {}", me.username);

    Ok(redirect_flashed(
        session::logout(jar),
        Flash::new(FlashCategory::Info, "Your account has been deleted."),
        "/signup",
    ))
}

/// POST /users/add_like/{message_id} — like the message, or unlike it if
/// already liked.
pub async fn add_like(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(message_id): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let my_id = me.id.clone();
    blocking(&state, move |s| s.db.toggle_like(&my_id, &message_id))
        .await??
        .ok_or(ApiError::Unauthorized)?;

    Ok(views::redirect(jar, "/"))
}
