use super::handlers;
use axum::{routing::get, Router};

/// Creates the users router
pub fn users_routes() -> Router {
    Router::new().route("/api/activity", get(handlers::get_activity))
}
