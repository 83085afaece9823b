//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider id under which Strava identities are stored
pub const STRAVA_PROVIDER_ID: &str = "strava";

/// Identity as reported by the external provider, normalized.
/// Produced once per login and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider_id: String,
    pub provider_user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Strava never sends one; present only for providers that do.
    pub email: Option<String>,
}

/// Access/refresh token pair for one provider connection.
///
/// `Debug` never prints the token values.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenBundle {
    /// An empty refresh token makes the bundle terminal: once expired the
    /// user has to sign in again.
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Signed session token handed to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SessionToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// What request handlers get to see of a session
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub provider_user_id: String,
    pub access_token: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl fmt::Debug for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionView")
            .field("provider_user_id", &self.provider_user_id)
            .field("access_token", &"<redacted>")
            .field("name", &self.name)
            .field("image", &self.image)
            .finish()
    }
}

/// Query parameters Strava appends to the redirect URI
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub scope: Option<String>,
}
