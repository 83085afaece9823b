//! Strava identity provider adapter
//!
//! Static OAuth endpoints for Strava plus the translation of its athlete
//! and token payloads into [`ExternalIdentity`] and [`TokenBundle`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::AuthError;
use super::models::{ExternalIdentity, TokenBundle, STRAVA_PROVIDER_ID};

pub const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
pub const STRAVA_PROFILE_URL: &str = "https://www.strava.com/api/v3/athlete";
pub const STRAVA_SCOPE: &str = "read,activity:read,activity:read_all,profile:read_all";

/// Strava OAuth endpoints and authorization parameters
#[derive(Debug, Clone)]
pub struct StravaProvider {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scope: String,
    pub approval_prompt: String,
}

impl Default for StravaProvider {
    fn default() -> Self {
        Self {
            authorize_url: STRAVA_AUTHORIZE_URL.to_string(),
            token_url: STRAVA_TOKEN_URL.to_string(),
            profile_url: STRAVA_PROFILE_URL.to_string(),
            scope: STRAVA_SCOPE.to_string(),
            approval_prompt: "auto".to_string(),
        }
    }
}

impl StravaProvider {
    pub fn id(&self) -> &'static str {
        STRAVA_PROVIDER_ID
    }

    /// Translate a Strava athlete payload into an [`ExternalIdentity`].
    ///
    /// Only `id` is required. It may arrive as a number or a string and is
    /// always stored as a string. Strava does not expose email addresses, so
    /// the identity never carries one.
    pub fn normalize(&self, raw: &Value) -> Result<ExternalIdentity, AuthError> {
        let provider_user_id = raw
            .get("id")
            .and_then(coerce_id)
            .ok_or_else(|| AuthError::MalformedProfile("athlete id missing".to_string()))?;

        let firstname = str_field(raw, "firstname").unwrap_or_default();
        let lastname = str_field(raw, "lastname").unwrap_or_default();
        let display_name = format!("{} {}", firstname, lastname).trim().to_string();

        let avatar_url = str_field(raw, "profile").filter(|url| !url.is_empty());

        Ok(ExternalIdentity {
            provider_id: self.id().to_string(),
            provider_user_id,
            display_name,
            avatar_url,
            email: None,
        })
    }

    /// Extract the token triple from a token endpoint (or enriched profile)
    /// response. A missing refresh token yields a terminal bundle.
    pub fn token_bundle(&self, raw: &Value) -> Result<TokenBundle, AuthError> {
        let access_token = str_field(raw, "access_token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedProfile("access_token missing".to_string()))?;

        let refresh_token = str_field(raw, "refresh_token").unwrap_or_default();

        let expires_at = raw
            .get("expires_at")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| AuthError::MalformedProfile("expires_at missing".to_string()))?;

        Ok(TokenBundle {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Build the URL the browser is sent to in order to start the flow
    pub fn authorization_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.approval_prompt),
            urlencoding::encode(&self.scope),
            urlencoding::encode(state)
        )
    }
}

fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string())),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_coerces_numeric_id() {
        let provider = StravaProvider::default();
        let identity = provider
            .normalize(&json!({
                "id": 42,
                "firstname": "Jane",
                "lastname": "Doe",
                "profile": "https://dgalywyr863hv.cloudfront.net/pictures/athletes/42/large.jpg"
            }))
            .unwrap();

        assert_eq!(identity.provider_id, "strava");
        assert_eq!(identity.provider_user_id, "42");
        assert_eq!(identity.display_name, "Jane Doe");
        assert!(identity.avatar_url.is_some());
        assert_eq!(identity.email, None);
    }

    #[test]
    fn normalize_accepts_string_id_and_partial_name() {
        let provider = StravaProvider::default();
        let identity = provider
            .normalize(&json!({ "id": "1234567", "firstname": "Jane" }))
            .unwrap();

        assert_eq!(identity.provider_user_id, "1234567");
        assert_eq!(identity.display_name, "Jane");
        assert_eq!(identity.avatar_url, None);
    }

    #[test]
    fn normalize_rejects_missing_id() {
        let provider = StravaProvider::default();
        let result = provider.normalize(&json!({ "firstname": "Jane", "lastname": "Doe" }));
        assert!(matches!(result, Err(AuthError::MalformedProfile(_))));
    }

    #[test]
    fn normalize_rejects_null_or_blank_id() {
        let provider = StravaProvider::default();
        assert!(provider.normalize(&json!({ "id": null })).is_err());
        assert!(provider.normalize(&json!({ "id": "  " })).is_err());
        assert!(provider.normalize(&json!({ "id": true })).is_err());
    }

    #[test]
    fn token_bundle_reads_strava_token_response() {
        let provider = StravaProvider::default();
        let bundle = provider
            .token_bundle(&json!({
                "token_type": "Bearer",
                "access_token": "a1",
                "refresh_token": "r1",
                "expires_at": 1_700_000_000,
                "expires_in": 21600
            }))
            .unwrap();

        assert_eq!(bundle.access_token, "a1");
        assert_eq!(bundle.refresh_token, "r1");
        assert_eq!(bundle.expires_at.timestamp(), 1_700_000_000);
        assert!(bundle.can_refresh());
    }

    #[test]
    fn token_bundle_without_refresh_token_is_terminal() {
        let provider = StravaProvider::default();
        let bundle = provider
            .token_bundle(&json!({ "access_token": "a1", "expires_at": 1_700_000_000 }))
            .unwrap();
        assert!(!bundle.can_refresh());
    }

    #[test]
    fn token_bundle_requires_access_token_and_expiry() {
        let provider = StravaProvider::default();
        assert!(provider
            .token_bundle(&json!({ "refresh_token": "r1", "expires_at": 1 }))
            .is_err());
        assert!(provider
            .token_bundle(&json!({ "access_token": "a1", "refresh_token": "r1" }))
            .is_err());
    }

    #[test]
    fn authorization_url_carries_strava_parameters() {
        let provider = StravaProvider::default();
        let url = provider.authorization_url(
            "12345",
            "http://localhost:8080/api/auth/strava/callback",
            "xyz",
        );

        assert!(url.starts_with(STRAVA_AUTHORIZE_URL));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("approval_prompt=auto"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains(
            "scope=read%2Cactivity%3Aread%2Cactivity%3Aread_all%2Cprofile%3Aread_all"
        ));
    }

    #[test]
    fn token_bundle_debug_hides_tokens() {
        let provider = StravaProvider::default();
        let bundle = provider
            .token_bundle(&json!({
                "access_token": "secret-access",
                "refresh_token": "secret-refresh",
                "expires_at": 1_700_000_000
            }))
            .unwrap();
        let printed = format!("{:?}", bundle);
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }
}
