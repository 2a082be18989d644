mod common;

use axum::http::StatusCode;
use uuid::Uuid;

use common::TestApp;

struct Fixture {
    app: TestApp,
    testuser: warbler_db::models::UserRow,
    testuser2: warbler_db::models::UserRow,
}

fn setup() -> Fixture {
    let app = TestApp::new();
    let testuser = app.signup("testuser", "test@test.com", "testuser");
    let testuser2 = app.signup("testuser2", "test2@test.com", "password");
    Fixture {
        app,
        testuser,
        testuser2,
    }
}

#[tokio::test]
async fn signup_page_loads() {
    let Fixture { mut app, .. } = setup();

    let resp = app.get("/signup").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "signup");
    assert!(resp.text.contains("Join Warbler today."));
}

#[tokio::test]
async fn signup_creates_user_and_logs_in() {
    let Fixture { mut app, .. } = setup();

    let resp = app
        .post(
            "/signup",
            &[("username", "Test1"), ("email", "Testemail@email.com"), ("password", "password")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/"));

    let home = app.follow(resp).await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.view(), "home");
    assert_eq!(home.json["user"]["username"], "Test1");

    let stored = app.db().get_user_by_username("Test1").unwrap().unwrap();
    assert_ne!(stored.password, "password");
}

#[tokio::test]
async fn duplicate_username_is_reported() {
    let Fixture { mut app, .. } = setup();

    let resp = app
        .post(
            "/signup",
            &[("username", "testuser"), ("email", "Testemail@email.com"), ("password", "password")],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "signup");
    assert!(resp.flashes().contains(&"Username already taken".to_string()));
    assert!(app.db().get_user_by_username("testuser").unwrap().is_some());
    assert_eq!(app.db().list_users(None).unwrap().len(), 2);
}

#[tokio::test]
async fn signup_with_short_password_shows_field_error() {
    let Fixture { mut app, .. } = setup();

    let resp = app
        .post("/signup", &[("username", "newbie"), ("email", "new@email.com"), ("password", "abc")])
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json["errors"]["password"].is_array());
    assert!(resp.json["values"].get("password").is_none());
    assert!(app.db().get_user_by_username("newbie").unwrap().is_none());
}

#[tokio::test]
async fn login_page_loads() {
    let Fixture { mut app, .. } = setup();

    let resp = app.get("/login").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text.contains("Log in"));
    assert!(resp.text.contains("Password"));
}

#[tokio::test]
async fn login_sets_session() {
    let Fixture { mut app, .. } = setup();

    let resp = app
        .post_followed("/login", &[("username", "testuser"), ("password", "testuser")])
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "home");
    assert_eq!(resp.json["user"]["username"], "testuser");
    assert!(resp.flashes().contains(&"Hello, testuser!".to_string()));

    // Session persists to protected pages
    let users = app.get("/users").await;
    assert_eq!(users.status, StatusCode::OK);
}

#[tokio::test]
async fn login_with_unknown_username_or_wrong_password_fails_alike() {
    let Fixture { mut app, .. } = setup();

    let unknown = app
        .post("/login", &[("username", "fakeusername"), ("password", "testuser")])
        .await;
    let wrong = app
        .post("/login", &[("username", "testuser"), ("password", "wrongpassword")])
        .await;

    for resp in [&unknown, &wrong] {
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.view(), "login");
        assert!(resp.text.contains("Log in"));
        assert!(resp.text.contains("Password"));
        assert_eq!(resp.flashes(), ["Invalid credentials."]);
    }

    app.get_followed("/users").await.assert_unauthorized();
}

#[tokio::test]
async fn logout_ends_session() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let resp = app.get_followed("/logout").await;
    assert_eq!(resp.view(), "login");
    assert!(resp.flashes().contains(&"You have successfully logged out.".to_string()));

    app.get_followed("/users").await.assert_unauthorized();
}

#[tokio::test]
async fn users_list_shows_users() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let resp = app.get("/users").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.usernames(), ["testuser", "testuser2"]);

    let resp = app.get("/users?q=user2").await;
    assert_eq!(resp.usernames(), ["testuser2"]);
    assert_eq!(resp.json["query"], "user2");
}

#[tokio::test]
async fn user_profile_shows_user() {
    let Fixture { mut app, testuser, .. } = setup();
    app.add_message(&testuser, "my first warble");
    app.login_as(&testuser);

    let resp = app.get(&format!("/users/{}", testuser.id)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["user"]["username"], "testuser");
    assert_eq!(resp.json["messages"][0]["text"], "my first warble");
    assert_eq!(resp.json["followers_count"], 0);
    assert!(resp.json["user"].get("password").is_none());
}

#[tokio::test]
async fn unknown_user_profile_is_unauthorized() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let path = format!("/users/{}", Uuid::new_v4());
    app.get_followed(&path).await.assert_unauthorized();
    app.get_followed("/users/not-an-id").await.assert_unauthorized();
}

#[tokio::test]
async fn following_page_when_logged_in() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.db().follow(&testuser.id, &testuser2.id).unwrap();
    app.login_as(&testuser);

    let resp = app.get(&format!("/users/{}/following", testuser.id)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "following");
    assert_eq!(resp.usernames(), ["testuser2"]);
}

#[tokio::test]
async fn following_page_when_logged_out() {
    let Fixture { mut app, testuser, .. } = setup();

    app.get_followed(&format!("/users/{}/following", testuser.id))
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn followers_page_when_logged_in() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.db().follow(&testuser.id, &testuser2.id).unwrap();
    app.login_as(&testuser);

    let resp = app.get(&format!("/users/{}/followers", testuser2.id)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "followers");
    assert_eq!(resp.usernames(), ["testuser"]);
}

#[tokio::test]
async fn followers_page_when_logged_out() {
    let Fixture { mut app, testuser2, .. } = setup();

    app.get_followed(&format!("/users/{}/followers", testuser2.id))
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn follow_user() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.login_as(&testuser);

    let resp = app.post(&format!("/users/follow/{}", testuser2.id), &[]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let page = app.follow(resp).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.json["user"]["username"], "testuser");
    assert_eq!(page.usernames(), ["testuser2"]);
    assert!(app.db().is_followed_by(&testuser2.id, &testuser.id).unwrap());

    // Following twice keeps a single edge
    app.post(&format!("/users/follow/{}", testuser2.id), &[]).await;
    assert_eq!(app.db().count_followers(&testuser2.id).unwrap(), 1);
}

#[tokio::test]
async fn follow_self_is_ignored() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let page = app
        .post_followed(&format!("/users/follow/{}", testuser.id), &[])
        .await;

    assert!(page.flashes().contains(&"You cannot follow yourself.".to_string()));
    assert_eq!(app.db().count_following(&testuser.id).unwrap(), 0);
}

#[tokio::test]
async fn follow_when_logged_out_is_unauthorized() {
    let Fixture { mut app, testuser, testuser2 } = setup();

    app.post_followed(&format!("/users/follow/{}", testuser2.id), &[])
        .await
        .assert_unauthorized();
    assert_eq!(app.db().count_following(&testuser.id).unwrap(), 0);
}

#[tokio::test]
async fn stop_following_user() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.db().follow(&testuser.id, &testuser2.id).unwrap();
    app.db().follow(&testuser2.id, &testuser.id).unwrap();
    app.login_as(&testuser);

    let page = app
        .post_followed(&format!("/users/stop-following/{}", testuser2.id), &[])
        .await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.usernames().is_empty());
    assert!(!page.text.contains("testuser2"));
    // The reverse edge is untouched
    assert!(app.db().is_following(&testuser2.id, &testuser.id).unwrap());

    // Unfollowing again is a no-op
    let again = app
        .post_followed(&format!("/users/stop-following/{}", testuser2.id), &[])
        .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn profile_form_when_logged_in() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let resp = app.get("/users/profile").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text.contains("New header image url"));
    assert_eq!(resp.json["values"]["username"], "testuser");
}

#[tokio::test]
async fn profile_form_when_logged_out() {
    let Fixture { mut app, .. } = setup();

    app.get_followed("/users/profile").await.assert_unauthorized();
}

#[tokio::test]
async fn update_profile_requires_current_password() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let resp = app
        .post("/users/profile", &[("bio", "hello there"), ("password", "wrongpassword")])
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.flashes(), ["Wrong password, please try again."]);
    let unchanged = app.db().get_user_by_id(&testuser.id).unwrap().unwrap();
    assert!(unchanged.bio.is_none());

    let page = app
        .post_followed(
            "/users/profile",
            &[("bio", "hello there"), ("username", ""), ("password", "testuser")],
        )
        .await;
    assert_eq!(page.view(), "profile");
    assert_eq!(page.json["user"]["bio"], "hello there");
    assert_eq!(page.json["user"]["username"], "testuser");
    assert!(page.flashes().contains(&"Profile updated.".to_string()));
}

#[tokio::test]
async fn update_profile_to_taken_username_is_reported() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    let resp = app
        .post("/users/profile", &[("username", "testuser2"), ("password", "testuser")])
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.flashes(), ["Username already taken"]);
}

#[tokio::test]
async fn user_likes_message() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    let message_id = app.add_message(&testuser2, "Testtext");
    app.login_as(&testuser);

    let resp = app.post(&format!("/users/add_like/{}", message_id), &[]).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(app.db().count_likes_for_message(&message_id).unwrap(), 1);
    assert!(app.db().has_liked(&testuser.id, &message_id).unwrap());

    let likes = app.get(&format!("/users/{}/likes", testuser.id)).await;
    assert_eq!(likes.json["messages"][0]["text"], "Testtext");

    // A second press unlikes
    app.post(&format!("/users/add_like/{}", message_id), &[]).await;
    assert_eq!(app.db().count_likes_for_message(&message_id).unwrap(), 0);
}

#[tokio::test]
async fn liking_unknown_message_is_unauthorized() {
    let Fixture { mut app, testuser, .. } = setup();
    app.login_as(&testuser);

    app.post_followed(&format!("/users/add_like/{}", Uuid::new_v4()), &[])
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn session_for_missing_user_is_unauthorized() {
    let Fixture { mut app, .. } = setup();
    app.login_as_id(Uuid::new_v4());

    app.get_followed("/users").await.assert_unauthorized();
}

#[tokio::test]
async fn forged_session_cookie_is_unauthorized() {
    let Fixture { mut app, testuser, .. } = setup();
    let forged =
        warbler_api::session::issue_token("not-the-secret", testuser.id.parse().unwrap(), 1).unwrap();
    app.set_session_token(forged);

    app.get_followed("/users").await.assert_unauthorized();

    let home = app.get("/").await;
    assert_eq!(home.view(), "landing");
}

#[tokio::test]
async fn bearer_token_opens_protected_routes() {
    let Fixture { mut app, testuser, .. } = setup();
    let token =
        warbler_api::session::issue_token(common::SECRET, testuser.id.parse().unwrap(), 1).unwrap();
    app.set_bearer(token);

    let resp = app.get("/users").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.usernames(), ["testuser", "testuser2"]);
}

#[tokio::test]
async fn forged_bearer_token_is_unauthorized() {
    let Fixture { mut app, testuser, .. } = setup();
    let forged =
        warbler_api::session::issue_token("not-the-secret", testuser.id.parse().unwrap(), 1).unwrap();
    app.set_bearer(forged);

    app.get_followed("/users").await.assert_unauthorized();
}

#[tokio::test]
async fn delete_account_removes_user_and_content() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.add_message(&testuser, "going away");
    app.db().follow(&testuser.id, &testuser2.id).unwrap();
    app.login_as(&testuser);

    let page = app.post_followed("/users/delete", &[]).await;

    assert_eq!(page.view(), "signup");
    assert!(app.db().get_user_by_id(&testuser.id).unwrap().is_none());
    assert_eq!(app.db().count_messages(&testuser.id).unwrap(), 0);
    assert_eq!(app.db().count_followers(&testuser2.id).unwrap(), 0);

    app.get_followed("/users").await.assert_unauthorized();
}

#[tokio::test]
async fn home_timeline_includes_followed_users() {
    let Fixture { mut app, testuser, testuser2 } = setup();
    app.add_message(&testuser2, "from a friend");
    app.db().follow(&testuser.id, &testuser2.id).unwrap();
    app.login_as(&testuser);

    let resp = app.get("/").await;

    assert_eq!(resp.view(), "home");
    assert_eq!(resp.json["messages"][0]["text"], "from a friend");
    assert_eq!(resp.json["messages"][0]["author"]["username"], "testuser2");
}

#[tokio::test]
async fn home_when_logged_out_is_landing_page() {
    let Fixture { mut app, .. } = setup();

    let resp = app.get("/").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.view(), "landing");
    assert!(resp.flashes().is_empty());
}
