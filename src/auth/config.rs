//! Authentication configuration, loaded once at startup

use chrono::Duration;
use std::env;
use tracing::warn;

use super::refresh::DEFAULT_SKEW_WINDOW_SECS;

const PLACEHOLDER_SECRET: &str = "replace_with_strong_secret";
const MIN_SECRET_LEN: usize = 32;

pub const SESSION_COOKIE_NAME: &str = "session";
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

#[derive(Clone)]
pub struct AuthConfig {
    pub session_secret: String,
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub redirect_uri: String,
    pub sign_in_path: String,
    pub frontend_url: String,
    pub session_clock_skew: Duration,
    pub refresh_skew_window: Duration,
    pub cookie_secure: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"<redacted>")
            .field("strava_client_id", &self.strava_client_id)
            .field("strava_client_secret", &self.strava_client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("sign_in_path", &self.sign_in_path)
            .field("frontend_url", &self.frontend_url)
            .field("session_clock_skew", &self.session_clock_skew)
            .field("refresh_skew_window", &self.refresh_skew_window)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let session_secret =
            env::var("SESSION_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.to_string());
        if session_secret == PLACEHOLDER_SECRET {
            warn!("SESSION_SECRET not set, using placeholder secret - DO NOT USE IN PRODUCTION");
        } else if session_secret.len() < MIN_SECRET_LEN {
            warn!(
                length = session_secret.len(),
                minimum = MIN_SECRET_LEN,
                "SESSION_SECRET is shorter than recommended"
            );
        }

        let strava_client_id = env::var("STRAVA_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let strava_client_secret = env::var("STRAVA_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.is_empty());
        if strava_client_id.is_none() || strava_client_secret.is_none() {
            warn!("STRAVA_CLIENT_ID/STRAVA_CLIENT_SECRET not set, Strava sign-in disabled");
        }

        let redirect_uri = env::var("STRAVA_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:8080/api/auth/strava/callback".to_string());
        let sign_in_path = env::var("SIGN_IN_PATH").unwrap_or_else(|_| "/sign-in".to_string());
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let session_clock_skew = seconds_from_env("SESSION_CLOCK_SKEW_SECONDS");
        let refresh_skew_window = seconds_from_env("TOKEN_REFRESH_SKEW_SECONDS");

        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or_else(|_| frontend_url.starts_with("https://"));

        Self {
            session_secret,
            strava_client_id,
            strava_client_secret,
            redirect_uri,
            sign_in_path,
            frontend_url,
            session_clock_skew,
            refresh_skew_window,
            cookie_secure,
        }
    }

    /// Sign-in page URL with an error indicator appended
    pub fn sign_in_url_with_error(&self, code: &str) -> String {
        format!(
            "{}{}?error={}",
            self.frontend_url.trim_end_matches('/'),
            self.sign_in_path,
            urlencoding::encode(code)
        )
    }
}

fn seconds_from_env(key: &str) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(DEFAULT_SKEW_WINDOW_SECS);
    Duration::seconds(secs)
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        session_secret: "test-session-secret-with-32-bytes!!".to_string(),
        strava_client_id: Some("12345".to_string()),
        strava_client_secret: Some("shhh".to_string()),
        redirect_uri: "http://localhost:8080/api/auth/strava/callback".to_string(),
        sign_in_path: "/sign-in".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        session_clock_skew: Duration::seconds(60),
        refresh_skew_window: Duration::seconds(60),
        cookie_secure: false,
    }
}
