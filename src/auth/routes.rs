//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /api/auth/strava` - Start Strava OAuth
/// - `GET /api/auth/strava/callback` - Strava OAuth callback
/// - `GET /api/auth/session` - Current session view
/// - `POST /api/auth/refresh` - Refresh the Strava token and re-issue the session
/// - `POST /api/auth/logout` - Clear the session cookie
/// - `GET /api/me` - Get current user information
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/strava", get(handlers::strava_oauth_start))
        .route(
            "/api/auth/strava/callback",
            get(handlers::strava_oauth_callback),
        )
        .route("/api/auth/session", get(handlers::session_handler))
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/me", get(handlers::me_handler))
}
