pub mod auth;
pub mod credentials;
pub mod error;
pub mod flash;
pub mod home;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod users;
pub mod views;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
