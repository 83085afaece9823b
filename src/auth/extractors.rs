//! Session extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::debug;

use super::config::SESSION_COOKIE_NAME;
use super::models::SessionView;
use super::session::SessionClaims;
use crate::common::{ApiError, AppState};

/// Raw session token from `Authorization: Bearer` or the session cookie
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Authenticated session.
///
/// Rejects with a redirect to the sign-in page when the request carries no
/// token or one that fails verification.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub claims: SessionClaims,
    pub view: SessionView,
}

/// Session if present and valid; anonymous otherwise
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<CurrentSession>);

async fn app_state<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<Arc<AppState>, ApiError> {
    let Extension(app_state): Extension<Arc<AppState>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;
    Ok(app_state)
}

fn resolve(app_state: &AppState, headers: &HeaderMap) -> Option<CurrentSession> {
    let token = session_token_from_headers(headers)?;

    match app_state.session_codec.decode(&token) {
        Ok((claims, view)) => Some(CurrentSession { claims, view }),
        Err(e) => {
            debug!(error = %e, "Treating request as anonymous");
            None
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;
        Ok(MaybeSession(resolve(&app_state, &parts.headers)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;

        resolve(&app_state, &parts.headers).ok_or_else(|| {
            debug!(uri = %parts.uri, "No valid session, redirecting to sign-in");
            ApiError::SignInRequired(sign_in_location(&app_state))
        })
    }
}

pub(crate) fn sign_in_location(app_state: &AppState) -> String {
    format!(
        "{}{}",
        app_state.auth_config.frontend_url.trim_end_matches('/'),
        app_state.auth_config.sign_in_path
    )
}
