// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::config::AuthConfig;
use crate::auth::refresh::RefreshPolicy;
use crate::auth::session::SessionCodec;
use crate::services::StravaService;
use crate::users::UsersService;

/// Services and configuration.
///
/// Built once at startup and shared read-only as `Arc<AppState>`; the
/// session signing key inside `session_codec` never changes at runtime.
#[derive(Clone)]
pub struct AppState {
    pub auth_config: Arc<AuthConfig>,
    pub session_codec: Arc<SessionCodec>,
    pub refresh_policy: RefreshPolicy,
    pub strava_service: Arc<StravaService>,
    pub users_service: Arc<UsersService>,
}

impl AppState {
    pub fn new(db: SqlitePool, auth_config: AuthConfig, strava_service: StravaService) -> Self {
        let session_codec = SessionCodec::new(
            auth_config.session_secret.as_bytes(),
            auth_config.session_clock_skew,
        );
        let refresh_policy = RefreshPolicy::new(auth_config.refresh_skew_window);
        let users_service = UsersService::new(db);

        Self {
            auth_config: Arc::new(auth_config),
            session_codec: Arc::new(session_codec),
            refresh_policy,
            strava_service: Arc::new(strava_service),
            users_service: Arc::new(users_service),
        }
    }
}
