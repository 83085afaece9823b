use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use super::config::{OAUTH_STATE_COOKIE_NAME, SESSION_COOKIE_NAME};
use super::models::SessionToken;

/// Path the OAuth state cookie is scoped to
const AUTH_PATH: &str = "/api/auth";
const STATE_TTL_MINUTES: i64 = 10;
/// The JWT expiry governs validity; the cookie only has to outlive it.
const SESSION_COOKIE_DAYS: i64 = 30;

/// CSRF state for the authorization request.
pub(super) fn state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE_NAME, state.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(AUTH_PATH)
        .max_age(Duration::minutes(STATE_TTL_MINUTES))
        .build()
}

pub(super) fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE_NAME).path(AUTH_PATH).build()
}

pub(super) fn session_cookie(token: SessionToken, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token.into_inner()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(SESSION_COOKIE_DAYS))
        .build()
}

pub(super) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME).path("/").build()
}
