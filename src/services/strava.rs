// src/services/strava.rs
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::auth::config::AuthConfig;
use crate::auth::provider::StravaProvider;

#[derive(Debug, Error)]
pub enum StravaError {
    #[error("Strava OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    /// Connect/timeout failures and 5xx answers; safe for the caller to retry.
    #[error("Strava temporarily unavailable: {0}")]
    Transient(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// HTTP client for the Strava OAuth and athlete endpoints.
///
/// Returns raw JSON payloads; [`StravaProvider`] turns them into identities
/// and token bundles.
#[derive(Debug, Clone)]
pub struct StravaService {
    client: Client,
    provider: StravaProvider,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl StravaService {
    pub fn new(config: &AuthConfig, provider: StravaProvider) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            provider,
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    pub fn provider(&self) -> &StravaProvider {
        &self.provider
    }

    fn credentials(&self) -> Result<(&str, &str), StravaError> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(StravaError::NotConfigured),
        }
    }

    /// Get authorization URL for OAuth flow
    pub fn authorization_url(&self, state: &str) -> Result<String, StravaError> {
        let (client_id, _) = self.credentials()?;
        let url = self
            .provider
            .authorization_url(client_id, &self.redirect_uri, state);
        debug!(scope = %self.provider.scope, "Generated Strava authorization URL");
        Ok(url)
    }

    /// Exchange authorization code for tokens.
    /// The response carries `access_token`, `refresh_token`, `expires_at`
    /// and a summary `athlete` object.
    pub async fn exchange_code(&self, code: &str) -> Result<Value, StravaError> {
        let (client_id, client_secret) = self.credentials()?;
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");
        let body = self
            .send("token exchange", || {
                self.client.post(&self.provider.token_url).form(&params)
            })
            .await?;

        info!("Successfully exchanged authorization code for tokens");
        Ok(body)
    }

    /// Fetch the authenticated athlete's profile
    pub async fn fetch_athlete(&self, access_token: &str) -> Result<Value, StravaError> {
        self.send("athlete profile", || {
            self.client
                .get(&self.provider.profile_url)
                .bearer_auth(access_token)
        })
        .await
    }

    /// Refresh access token using refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Value, StravaError> {
        let (client_id, client_secret) = self.credentials()?;
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        debug!(has_refresh_token = !refresh_token.is_empty(), "Refreshing Strava access token");
        let body = self
            .send("token refresh", || {
                self.client.post(&self.provider.token_url).form(&params)
            })
            .await?;

        info!("Successfully refreshed access token");
        Ok(body)
    }

    /// Send a request, retrying once on connect/timeout errors.
    async fn send<F>(&self, operation: &'static str, build: F) -> Result<Value, StravaError>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = match build().send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(operation, error = %e, "Strava request failed, retrying once");
                build().send().await.map_err(|e| {
                    error!(operation, error = %e, "Strava request failed after retry");
                    classify(e)
                })?
            }
            Err(e) => {
                error!(operation, error = %e, "Strava request failed");
                return Err(classify(e));
            }
        };

        let status = response.status();
        debug!(operation, status = %status, "Received Strava response");

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(operation, status = %status, error = %error_text, "Strava request rejected");

            let detail = format!("{} returned HTTP {}: {}", operation, status, error_text);
            return Err(if status.is_server_error() {
                StravaError::Transient(detail)
            } else {
                StravaError::OAuthFailed(detail)
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StravaError::SerializationError(e.to_string()))
    }
}

fn classify(e: reqwest::Error) -> StravaError {
    if e.is_connect() || e.is_timeout() {
        StravaError::Transient(e.to_string())
    } else {
        StravaError::RequestFailed(e.to_string())
    }
}
