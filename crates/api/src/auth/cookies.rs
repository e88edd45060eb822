use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::registry::SessionId;

pub const SESSION_COOKIE: &str = "SESSION";
pub const ANTI_FORGERY_COOKIE: &str = "XSRF-TOKEN";
pub const ANTI_FORGERY_HEADER: &str = "x-xsrf-token";

/// Session cookie. No Max-Age: expiry is enforced server-side with a sliding window.
pub fn session_cookie(session_id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Script-readable so the client can echo it in the anti-forgery header.
pub fn anti_forgery_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((ANTI_FORGERY_COOKIE, token.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

pub fn clear_anti_forgery_cookie() -> Cookie<'static> {
    Cookie::build((ANTI_FORGERY_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

pub fn session_id_from(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .map(SessionId::from_client)
}

pub fn anti_forgery_from(jar: &CookieJar) -> Option<String> {
    jar.get(ANTI_FORGERY_COOKIE).map(|c| c.value().to_string())
}
