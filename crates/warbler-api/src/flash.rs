//! One-shot flash messages carried in a cookie across a redirect.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use tracing::warn;

use warbler_types::api::Flash;

pub const FLASH_COOKIE: &str = "warbler_flash";

fn read(jar: &CookieJar) -> Vec<Flash> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };

    B64.decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| {
            warn!("Discarding unreadable flash cookie");
            Vec::new()
        })
}

/// Queue a flash for the next page served to this client.
pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let mut pending = read(&jar);
    pending.push(flash);

    // Serializing a Vec of plain structs cannot fail
    let payload = serde_json::to_vec(&pending).unwrap_or_default();
    jar.add(
        Cookie::build((FLASH_COOKIE, B64.encode(payload)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Drain pending flashes, clearing the cookie when there were any.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let pending = read(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, pending);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), pending)
}
