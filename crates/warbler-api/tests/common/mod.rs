#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use axum_extra::extract::cookie::Cookie;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use warbler_api::credentials::{self, Hasher, Signup};
use warbler_api::session::{self, SESSION_COOKIE};
use warbler_api::{AppState, AppStateInner, router};
use warbler_db::Database;
use warbler_db::models::UserRow;

pub const SECRET: &str = "test-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub text: String,
    pub json: Value,
}

impl TestResponse {
    pub fn view(&self) -> &str {
        self.json["view"].as_str().unwrap_or_default()
    }

    pub fn flashes(&self) -> Vec<String> {
        self.json["flashes"]
            .as_array()
            .map(|flashes| {
                flashes
                    .iter()
                    .filter_map(|f| f["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.json["users"]
            .as_array()
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| u["username"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn assert_unauthorized(&self) {
        assert_eq!(self.status, StatusCode::OK);
        assert!(
            self.text.contains("Access unauthorized."),
            "expected unauthorized page, got {}",
            self.text
        );
    }
}

/// Drives the router in-process, carrying cookies between requests the way a
/// browser would.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    cookies: BTreeMap<String, String>,
    bearer: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            session_secret: SECRET.to_string(),
            session_days: 1,
            hasher: Hasher::with_cost(256, 1).unwrap(),
        });
        let router = router(state.clone());
        Self {
            state,
            router,
            cookies: BTreeMap::new(),
            bearer: None,
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn signup(&self, username: &str, email: &str, password: &str) -> UserRow {
        credentials::signup(
            &self.state.db,
            &self.state.hasher,
            Signup {
                username,
                email,
                password: Some(password),
                image_url: None,
            },
        )
        .unwrap()
    }

    pub fn add_message(&self, user: &UserRow, text: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.db.insert_message(&id, &user.id, text).unwrap();
        id
    }

    /// Put a session for `user_id` straight into the cookie jar.
    pub fn login_as_id(&mut self, user_id: Uuid) {
        let token = session::issue_token(SECRET, user_id, 1).unwrap();
        self.set_session_token(token);
    }

    pub fn set_session_token(&mut self, token: String) {
        self.cookies.insert(SESSION_COOKIE.to_string(), token);
    }

    pub fn login_as(&mut self, user: &UserRow) {
        self.login_as_id(user.id.parse().unwrap());
    }

    /// Send `Authorization: Bearer <token>` on every following request.
    pub fn set_bearer(&mut self, token: String) {
        self.bearer = Some(token);
    }

    pub fn logged_out(&mut self) {
        self.cookies.clear();
        self.bearer = None;
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        self.send(Method::POST, path, Some(encode_form(form))).await
    }

    /// Like `get`, following redirects to the final page.
    pub async fn get_followed(&mut self, path: &str) -> TestResponse {
        let resp = self.get(path).await;
        self.follow(resp).await
    }

    /// Like `post`, following redirects to the final page.
    pub async fn post_followed(&mut self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        let resp = self.post(path, form).await;
        self.follow(resp).await
    }

    pub async fn follow(&mut self, mut resp: TestResponse) -> TestResponse {
        for _ in 0..5 {
            if resp.status != StatusCode::SEE_OTHER {
                return resp;
            }
            let location = resp.location.clone().expect("redirect without location");
            resp = self.get(&location).await;
        }
        panic!("redirect loop");
    }

    async fn send(&mut self, method: Method, path: &str, form: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }
        if let Some(token) = &self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(set_cookie.to_str().unwrap().to_string()).unwrap();
            if cookie.value().is_empty() {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            location,
            text,
            json,
        }
    }
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    fn encode(s: &str) -> String {
        s.bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                b' ' => "+".to_string(),
                _ => format!("%{:02X}", b),
            })
            .collect()
    }

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
