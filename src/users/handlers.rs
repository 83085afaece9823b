use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::models::ActivityLog;
use crate::auth::extractors::sign_in_location;
use crate::auth::models::STRAVA_PROVIDER_ID;
use crate::auth::CurrentSession;
use crate::common::{ApiError, AppState};

const DEFAULT_ACTIVITY_LIMIT: i64 = 20;
const MAX_ACTIVITY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

impl ActivityQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT)
    }
}

/// GET /api/activity - Recent activity of the current user's team
pub async fn get_activity(
    Extension(state): Extension<Arc<AppState>>,
    session: CurrentSession,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let provider = session
        .claims
        .provider
        .as_deref()
        .unwrap_or(STRAVA_PROVIDER_ID);

    let user = state
        .users_service
        .find_active_by_provider(provider, &session.view.provider_user_id)
        .await?
        .ok_or_else(|| ApiError::SignInRequired(sign_in_location(&state)))?;

    let limit = query.limit();
    debug!(user_id = user.id, limit = limit, "Fetching recent activity");

    let logs = state.users_service.recent_activity(user.id, limit).await?;
    Ok(Json(logs))
}
