//! Authentication handlers

use axum::{
    extract::{Extension, Json, Query},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::cookies::{clear_session_cookie, clear_state_cookie, session_cookie, state_cookie};
use super::config::OAUTH_STATE_COOKIE_NAME;
use super::error::AuthError;
use super::extractors::{sign_in_location, CurrentSession, MaybeSession};
use super::models::{OAuthCallbackParams, SessionToken, STRAVA_PROVIDER_ID};
use super::refresh::RefreshDecision;
use crate::common::{client_ip, ApiError, AppState};
use crate::services::strava::StravaError;
use crate::users::models::ActivityType;

/// GET /api/auth/strava - Start Strava OAuth flow
/// Redirects the browser to Strava's authorization page
pub async fn strava_oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();

    let auth_url = state
        .strava_service
        .authorization_url(&csrf_state)
        .map_err(|e| {
            error!(error = %e, "Failed to generate Strava OAuth URL");
            ApiError::ServiceUnavailable(e.to_string())
        })?;

    info!("Redirecting to Strava OAuth");
    let jar = jar.add(state_cookie(&csrf_state, state.auth_config.cookie_secure));
    Ok((jar, Redirect::to(&auth_url)))
}

/// GET /api/auth/strava/callback - Handle OAuth callback from Strava
///
/// On success the session cookie is set and the browser goes to the
/// frontend. Any failure lands on the sign-in page with `?error=<code>`.
pub async fn strava_oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> (CookieJar, Redirect) {
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(|c| c.value().to_string());
    let jar = jar.remove(clear_state_cookie());
    let ip = client_ip(&headers);

    match complete_sign_in(&state, &params, expected_state.as_deref(), ip.as_deref()).await {
        Ok(token) => {
            let jar = jar.add(session_cookie(token, state.auth_config.cookie_secure));
            (jar, Redirect::to(&state.auth_config.frontend_url))
        }
        Err(code) => {
            let location = state.auth_config.sign_in_url_with_error(code);
            (jar, Redirect::to(&location))
        }
    }
}

/// Callback steps; failures are reduced to the error code shown on the
/// sign-in page.
async fn complete_sign_in(
    state: &AppState,
    params: &OAuthCallbackParams,
    expected_state: Option<&str>,
    ip: Option<&str>,
) -> Result<SessionToken, &'static str> {
    if let Some(oauth_error) = &params.error {
        warn!(oauth_error = %oauth_error, "Strava OAuth returned error");
        return Err("AccessDenied");
    }

    match (expected_state, params.state.as_deref()) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => {
            warn!(
                has_state_cookie = expected_state.is_some(),
                has_state_param = params.state.is_some(),
                "OAuth state mismatch, possible CSRF"
            );
            return Err("StateMismatch");
        }
    }

    let code = params.code.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
        warn!("No authorization code in OAuth callback");
        "MissingCode"
    })?;

    debug!(scope = ?params.scope, "Received OAuth callback with authorization code");

    let provider = state.strava_service.provider();

    let token_response = state
        .strava_service
        .exchange_code(code)
        .await
        .map_err(|e| strava_error_code(&e))?;

    let tokens = provider
        .token_bundle(&token_response)
        .map_err(|e| auth_error_code(&e))?;

    let athlete = state
        .strava_service
        .fetch_athlete(&tokens.access_token)
        .await
        .map_err(|e| strava_error_code(&e))?;

    let identity = provider.normalize(&athlete).map_err(|e| auth_error_code(&e))?;

    let outcome = state
        .users_service
        .sign_in_with_provider(&identity, &tokens, ip)
        .await
        .map_err(|e| match e {
            ApiError::Forbidden(_) => "AccountDeleted",
            other => {
                error!(error = %other, "Failed to persist user during sign-in");
                "AccountUnavailable"
            }
        })?;

    let token = state
        .session_codec
        .encode(&identity, &tokens)
        .map_err(|e| auth_error_code(&e))?;

    info!(
        user_id = outcome.user.id,
        provider = STRAVA_PROVIDER_ID,
        created = outcome.created,
        has_refresh_token = tokens.can_refresh(),
        "User authentication successful via Strava OAuth"
    );

    Ok(token)
}

fn strava_error_code(e: &StravaError) -> &'static str {
    error!(error = %e, "Strava request failed during sign-in");
    match e {
        StravaError::NotConfigured => "ProviderNotConfigured",
        StravaError::Transient(_) => "ProviderUnavailable",
        _ => "OAuthFailed",
    }
}

fn auth_error_code(e: &AuthError) -> &'static str {
    warn!(error = %e, "Sign-in aborted");
    e.code()
}

/// GET /api/auth/session
/// Returns the session view, or `{"authenticated": false}` for anonymous requests
pub async fn session_handler(
    Extension(state): Extension<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
) -> Json<serde_json::Value> {
    let Some(session) = session else {
        return Json(serde_json::json!({ "authenticated": false }));
    };

    let decision = session
        .claims
        .token_bundle()
        .map(|bundle| state.refresh_policy.needs_refresh(&bundle, Utc::now()));
    let token_status = decision.map(|decision| match decision {
        RefreshDecision::Usable => "usable",
        RefreshDecision::Refresh => "refresh",
        RefreshDecision::RefreshImpossible => "refresh_impossible",
    });

    Json(serde_json::json!({
        "authenticated": true,
        "user": {
            "strava_id": session.view.provider_user_id,
            "strava_access_token": session.view.access_token,
            "name": session.view.name,
            "image": session.view.image,
        },
        "expires": session.claims.exp,
        "token_status": token_status,
        "needs_refresh": decision.is_some_and(RefreshDecision::needs_refresh),
    }))
}

/// POST /api/auth/refresh
/// Refreshes the Strava access token when the policy asks for it and
/// re-issues the session token with the rotated claims.
pub async fn refresh_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    session: CurrentSession,
) -> Result<Response, ApiError> {
    let bundle = session.claims.token_bundle().ok_or_else(|| {
        ApiError::from(AuthError::InvalidSession(
            "session carries no token bundle".to_string(),
        ))
    })?;

    match state.refresh_policy.check(&bundle, Utc::now()) {
        Ok(false) => {
            debug!(strava_id = %session.view.provider_user_id, "Access token still usable");
            return Ok(Json(serde_json::json!({
                "refreshed": false,
                "expires_at": bundle.expires_at.timestamp(),
            }))
            .into_response());
        }
        Ok(true) => {}
        Err(e) => {
            warn!(
                strava_id = %session.view.provider_user_id,
                error = %e,
                "Refresh impossible, forcing re-login"
            );
            return Ok(force_sign_in(&state, jar));
        }
    }

    let response = match state
        .strava_service
        .refresh_access_token(&bundle.refresh_token)
        .await
    {
        Ok(response) => response,
        Err(StravaError::Transient(msg)) => {
            warn!(error = %msg, "Strava unavailable during token refresh");
            return Err(ApiError::ServiceUnavailable(
                "Strava temporarily unavailable".to_string(),
            ));
        }
        Err(StravaError::NotConfigured) => {
            return Err(ApiError::ServiceUnavailable(
                "Strava OAuth not configured".to_string(),
            ));
        }
        Err(e) => {
            // Revoked or rejected refresh token
            warn!(error = %e, "Strava rejected refresh grant, forcing re-login");
            return Ok(force_sign_in(&state, jar));
        }
    };

    let mut rotated = state
        .strava_service
        .provider()
        .token_bundle(&response)
        .map_err(ApiError::from)?;
    if rotated.refresh_token.is_empty() {
        rotated.refresh_token = bundle.refresh_token.clone();
    }

    let provider = session
        .claims
        .provider
        .clone()
        .unwrap_or_else(|| STRAVA_PROVIDER_ID.to_string());
    if !state
        .users_service
        .store_tokens(&provider, &session.view.provider_user_id, &rotated)
        .await?
    {
        warn!(
            strava_id = %session.view.provider_user_id,
            "No active user for refreshed session, tokens not persisted"
        );
    }

    let token = state
        .session_codec
        .reissue(session.claims, &rotated)
        .map_err(ApiError::from)?;

    info!(
        strava_id = %session.view.provider_user_id,
        expires_at = rotated.expires_at.timestamp(),
        "Session re-issued with refreshed Strava token"
    );

    let body = Json(serde_json::json!({
        "refreshed": true,
        "expires_at": rotated.expires_at.timestamp(),
        "token": token.as_str(),
    }));
    let jar = jar.add(session_cookie(token, state.auth_config.cookie_secure));

    Ok((jar, body).into_response())
}

fn force_sign_in(state: &AppState, jar: CookieJar) -> Response {
    let jar = jar.remove(clear_session_cookie());
    (jar, ApiError::SignInRequired(sign_in_location(state))).into_response()
}

/// GET /api/me
/// Returns the current user's record with their team
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    session: CurrentSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = session
        .claims
        .provider
        .as_deref()
        .unwrap_or(STRAVA_PROVIDER_ID);

    let user = state
        .users_service
        .find_active_by_provider(provider, &session.view.provider_user_id)
        .await?
        .ok_or_else(|| {
            warn!(
                strava_id = %session.view.provider_user_id,
                "Session refers to unknown or deleted user"
            );
            ApiError::SignInRequired(sign_in_location(&state))
        })?;

    let team = state.users_service.team_for_user(user.id).await?;
    let members = match &team {
        Some(team) => state.users_service.team_members(team.id).await?,
        None => Vec::new(),
    };

    Ok(Json(serde_json::json!({
        "user": user,
        "team": team,
        "members": members,
    })))
}

/// POST /api/auth/logout
/// Clears the session cookie and records the sign-out
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    MaybeSession(session): MaybeSession,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(session) = session {
        let provider = session
            .claims
            .provider
            .as_deref()
            .unwrap_or(STRAVA_PROVIDER_ID);
        if let Some(user) = state
            .users_service
            .find_active_by_provider(provider, &session.view.provider_user_id)
            .await?
        {
            let ip = client_ip(&headers);
            // not critical for sign-out
            if let Err(e) = state
                .users_service
                .log_activity(user.id, ActivityType::SignOut, ip.as_deref())
                .await
            {
                error!(error = %e, user_id = user.id, "Failed to record sign-out");
            }
            info!(user_id = user.id, "User logout successful");
        }
    }

    let jar = jar.remove(clear_session_cookie());
    Ok((
        jar,
        Json(serde_json::json!({
            "message": "Logout successful"
        })),
    ))
}
