//! Session token codec
//!
//! A session is an HS256 JWT carrying the normalized identity and the
//! provider token bundle. The token's `exp` is the bundle's `expires_at`
//! and verification allows the configured clock skew as leeway, so a
//! session dies with its access token unless it gets re-issued after a
//! refresh.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AuthError;
use super::models::{ExternalIdentity, SessionToken, SessionView, TokenBundle};

/// Claims embedded in the session token.
///
/// Everything except `exp` is optional so that a token issued before the
/// provider callback completed still decodes; [`SessionClaims::view`]
/// decides whether it is usable.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionClaims {
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strava_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strava_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strava_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strava_token_expires_at: Option<i64>,
}

impl std::fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClaims")
            .field("exp", &self.exp)
            .field("provider", &self.provider)
            .field("strava_id", &self.strava_id)
            .field("has_access_token", &self.strava_access_token.is_some())
            .field("has_refresh_token", &self.strava_refresh_token.is_some())
            .finish()
    }
}

/// Identity and tokens obtained from a completed provider login
#[derive(Debug, Clone, Copy)]
pub struct LoginGrant<'a> {
    pub identity: &'a ExternalIdentity,
    pub tokens: &'a TokenBundle,
}

impl SessionClaims {
    /// Fold a login grant into existing claims.
    ///
    /// With a grant, identity and token claims are overwritten; without one
    /// the prior claims come back untouched.
    pub fn merge(self, grant: Option<LoginGrant<'_>>) -> Self {
        let Some(grant) = grant else {
            return self;
        };

        let identity = grant.identity;
        Self {
            name: Some(identity.display_name.clone()),
            picture: identity.avatar_url.clone(),
            email: identity.email.clone(),
            provider: Some(identity.provider_id.clone()),
            strava_id: Some(identity.provider_user_id.clone()),
            ..self
        }
        .with_tokens(grant.tokens)
    }

    /// Replace only the token claims, e.g. after a refresh grant.
    pub fn with_tokens(self, tokens: &TokenBundle) -> Self {
        Self {
            exp: tokens.expires_at.timestamp(),
            strava_access_token: Some(tokens.access_token.clone()),
            strava_refresh_token: Some(tokens.refresh_token.clone()),
            strava_token_expires_at: Some(tokens.expires_at.timestamp()),
            ..self
        }
    }

    /// Token bundle carried by the session, if the login completed.
    pub fn token_bundle(&self) -> Option<TokenBundle> {
        let access_token = self.strava_access_token.clone()?;
        let expires_at = self
            .strava_token_expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))?;

        Some(TokenBundle {
            access_token,
            refresh_token: self.strava_refresh_token.clone().unwrap_or_default(),
            expires_at,
        })
    }

    /// Project the claims handlers are allowed to see.
    pub fn view(&self) -> Result<SessionView, AuthError> {
        let provider_user_id = self
            .strava_id
            .clone()
            .ok_or_else(|| AuthError::InvalidSession("missing claim: strava_id".to_string()))?;
        let access_token = self.strava_access_token.clone().ok_or_else(|| {
            AuthError::InvalidSession("missing claim: strava_access_token".to_string())
        })?;

        Ok(SessionView {
            provider_user_id,
            access_token,
            name: self.name.clone(),
            image: self.picture.clone(),
        })
    }
}

/// Signs and verifies session tokens with the process-wide secret.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(secret: &[u8], clock_skew: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = clock_skew.num_seconds().max(0) as u64;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a session for a freshly completed login
    pub fn encode(
        &self,
        identity: &ExternalIdentity,
        tokens: &TokenBundle,
    ) -> Result<SessionToken, AuthError> {
        let claims = SessionClaims::default().merge(Some(LoginGrant { identity, tokens }));
        self.sign(&claims)
    }

    /// Re-sign existing claims with a rotated token bundle
    pub fn reissue(
        &self,
        claims: SessionClaims,
        tokens: &TokenBundle,
    ) -> Result<SessionToken, AuthError> {
        self.sign(&claims.with_tokens(tokens))
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<SessionToken, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map(SessionToken::from)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify the signature and expiry and return the raw claims.
    pub fn decode_claims(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Session token rejected");
                AuthError::InvalidSession(e.to_string())
            })
    }

    /// Verify a token and project its view. The claims come back alongside
    /// so a refresh can re-issue them.
    pub fn decode(&self, token: &str) -> Result<(SessionClaims, SessionView), AuthError> {
        let claims = self.decode_claims(token)?;
        let view = claims.view()?;
        Ok((claims, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-session-secret-with-32-bytes!!";

    fn codec() -> SessionCodec {
        SessionCodec::new(SECRET, Duration::seconds(60))
    }

    fn jane() -> ExternalIdentity {
        ExternalIdentity {
            provider_id: "strava".to_string(),
            provider_user_id: "42".to_string(),
            display_name: "Jane Doe".to_string(),
            avatar_url: None,
            email: None,
        }
    }

    fn tokens(expires_in: Duration) -> TokenBundle {
        TokenBundle {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test]
    fn encode_then_decode_yields_view() {
        let codec = codec();
        let token = codec.encode(&jane(), &tokens(Duration::hours(1))).unwrap();
        let (claims, view) = codec.decode(token.as_str()).unwrap();
        assert_eq!(claims.provider.as_deref(), Some("strava"));

        assert_eq!(view.provider_user_id, "42");
        assert_eq!(view.access_token, "a1");
        assert_eq!(view.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn encode_is_deterministic() {
        let codec = codec();
        let bundle = tokens(Duration::hours(1));
        let first = codec.encode(&jane(), &bundle).unwrap();
        let second = codec.encode(&jane(), &bundle).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tampered_token_is_invalid() {
        let codec = codec();
        let token = codec
            .encode(&jane(), &tokens(Duration::hours(1)))
            .unwrap()
            .into_inner();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let sig = parts[2].clone();
        let flipped = if sig.starts_with('A') { "B" } else { "A" };
        parts[2] = format!("{}{}", flipped, &sig[1..]);
        let tampered = parts.join(".");

        assert!(matches!(
            codec.decode(&tampered),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn unsigned_and_garbage_tokens_are_invalid() {
        let codec = codec();
        // {"alg":"none","typ":"JWT"}.{"exp":9999999999,"strava_id":"42","strava_access_token":"a1"}.
        let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJleHAiOjk5OTk5OTk5OTksInN0cmF2YV9pZCI6IjQyIiwic3RyYXZhX2FjY2Vzc190b2tlbiI6ImExIn0.";
        assert!(matches!(
            codec.decode(unsigned),
            Err(AuthError::InvalidSession(_))
        ));
        assert!(matches!(
            codec.decode("not-a-token"),
            Err(AuthError::InvalidSession(_))
        ));
        assert!(matches!(codec.decode(""), Err(AuthError::InvalidSession(_))));
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let other = SessionCodec::new(b"another-secret-another-secret-123", Duration::seconds(60));
        let token = other.encode(&jane(), &tokens(Duration::hours(1))).unwrap();
        assert!(codec().decode(token.as_str()).is_err());
    }

    #[test]
    fn expiry_honours_clock_skew() {
        let codec = codec();

        let within_skew = codec
            .encode(&jane(), &tokens(Duration::seconds(-30)))
            .unwrap();
        assert!(codec.decode(within_skew.as_str()).is_ok());

        let beyond_skew = codec
            .encode(&jane(), &tokens(Duration::seconds(-600)))
            .unwrap();
        assert!(matches!(
            codec.decode(beyond_skew.as_str()),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn claims_without_identity_decode_but_have_no_view() {
        let codec = codec();
        let claims = SessionClaims {
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            name: Some("Jane Doe".to_string()),
            ..SessionClaims::default()
        };
        let token = codec.sign(&claims).unwrap();

        let decoded = codec.decode_claims(token.as_str()).unwrap();
        assert_eq!(decoded, claims);
        assert!(matches!(
            codec.decode(token.as_str()),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn merge_without_grant_passes_claims_through() {
        let prior = SessionClaims::default().merge(Some(LoginGrant {
            identity: &jane(),
            tokens: &tokens(Duration::hours(1)),
        }));
        let merged = prior.clone().merge(None);
        assert_eq!(merged, prior);
    }

    #[test]
    fn merge_with_grant_overwrites_identity_and_tokens() {
        let prior = SessionClaims {
            exp: 1,
            name: Some("Old Name".to_string()),
            strava_id: Some("7".to_string()),
            strava_access_token: Some("old".to_string()),
            ..SessionClaims::default()
        };
        let bundle = tokens(Duration::hours(1));
        let merged = prior.merge(Some(LoginGrant {
            identity: &jane(),
            tokens: &bundle,
        }));

        assert_eq!(merged.strava_id.as_deref(), Some("42"));
        assert_eq!(merged.name.as_deref(), Some("Jane Doe"));
        assert_eq!(merged.strava_access_token.as_deref(), Some("a1"));
        assert_eq!(merged.provider.as_deref(), Some("strava"));
        assert_eq!(merged.exp, bundle.expires_at.timestamp());
    }

    #[test]
    fn reissue_rotates_tokens_and_keeps_identity() {
        let codec = codec();
        let first = codec.encode(&jane(), &tokens(Duration::seconds(30))).unwrap();
        let claims = codec.decode_claims(first.as_str()).unwrap();

        let rotated = TokenBundle {
            access_token: "a2".to_string(),
            refresh_token: "r2".to_string(),
            expires_at: Utc::now() + Duration::hours(6),
        };
        let second = codec.reissue(claims, &rotated).unwrap();
        let claims = codec.decode_claims(second.as_str()).unwrap();

        assert_eq!(claims.strava_id.as_deref(), Some("42"));
        let bundle = claims.token_bundle().unwrap();
        assert_eq!(bundle.access_token, "a2");
        assert_eq!(bundle.refresh_token, "r2");
        assert_eq!(bundle.expires_at.timestamp(), rotated.expires_at.timestamp());
    }
}
