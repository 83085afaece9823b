use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::models::{ActivityLog, ActivityType, SignInOutcome, Team, TeamMember, User};
use crate::auth::models::{ExternalIdentity, TokenBundle};
use crate::common::{safe_email_log, ApiError};

const USER_COLUMNS: &str = "id, name, email, role, avatar, provider, provider_id, strava_id, \
     strava_access_token, strava_refresh_token, strava_token_expires_at, \
     created_at, updated_at, deleted_at";

pub struct UsersService {
    db: SqlitePool,
}

impl UsersService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ============================================================================
    // Lookups
    // ============================================================================

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ? AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Includes soft-deleted rows so that a deleted account is not recreated.
    pub async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE provider = ? AND provider_id = ?",
            USER_COLUMNS
        ))
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                provider = %provider,
                provider_id = %provider_user_id,
                "Database error looking up user by provider"
            );
            ApiError::DatabaseError(e)
        })
    }

    pub async fn find_active_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, ApiError> {
        Ok(self
            .find_by_provider(provider, provider_user_id)
            .await?
            .filter(|u| !u.is_deleted()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }

    // ============================================================================
    // Provider sign-in
    // ============================================================================

    /// Link or create the account for a provider identity and store its
    /// tokens.
    ///
    /// Accounts are matched on `(provider, provider_id)`; email is only
    /// consulted when the provider supplied one. New accounts get a personal
    /// team with an owner membership.
    pub async fn sign_in_with_provider(
        &self,
        identity: &ExternalIdentity,
        tokens: &TokenBundle,
        ip_address: Option<&str>,
    ) -> Result<SignInOutcome, ApiError> {
        let mut existing = self
            .find_by_provider(&identity.provider_id, &identity.provider_user_id)
            .await?;

        if existing.is_none() {
            if let Some(email) = &identity.email {
                existing = self.find_by_email(email).await?;
                if existing.is_some() {
                    info!(
                        email = %safe_email_log(email),
                        provider = %identity.provider_id,
                        "Linking provider identity to existing account by email"
                    );
                }
            }
        }

        match existing {
            Some(user) if user.is_deleted() => {
                warn!(
                    user_id = user.id,
                    provider = %identity.provider_id,
                    "Sign-in attempt for deleted account"
                );
                Err(ApiError::Forbidden("account has been deleted".to_string()))
            }
            Some(user) => {
                self.update_provider_link(user.id, identity, tokens).await?;
                let user = self.find_by_id(user.id).await?.ok_or_else(|| {
                    ApiError::InternalServer("user vanished during sign-in".to_string())
                })?;
                let team_id = self.primary_team_id(user.id).await?;
                self.log_activity(user.id, ActivityType::SignIn, ip_address)
                    .await?;

                debug!(user_id = user.id, provider = %identity.provider_id, "Existing user signed in");
                Ok(SignInOutcome {
                    user,
                    team_id,
                    created: false,
                })
            }
            None => self.create_with_team(identity, tokens, ip_address).await,
        }
    }

    async fn update_provider_link(
        &self,
        user_id: i64,
        identity: &ExternalIdentity,
        tokens: &TokenBundle,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                avatar = COALESCE(?, avatar),
                provider = ?,
                provider_id = ?,
                strava_id = ?,
                strava_access_token = ?,
                strava_refresh_token = ?,
                strava_token_expires_at = ?,
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(non_empty(&identity.display_name))
        .bind(identity.avatar_url.as_deref())
        .bind(&identity.provider_id)
        .bind(&identity.provider_user_id)
        .bind(&identity.provider_user_id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at.timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user_id, "Database error updating provider link");
            ApiError::DatabaseError(e)
        })?;

        Ok(())
    }

    async fn create_with_team(
        &self,
        identity: &ExternalIdentity,
        tokens: &TokenBundle,
        ip_address: Option<&str>,
    ) -> Result<SignInOutcome, ApiError> {
        let mut tx = self.db.begin().await.map_err(ApiError::DatabaseError)?;

        let user_id = sqlx::query(
            r#"
            INSERT INTO users (
                name, email, role, avatar, provider, provider_id, strava_id,
                strava_access_token, strava_refresh_token, strava_token_expires_at
            ) VALUES (?, ?, 'owner', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(non_empty(&identity.display_name))
        .bind(identity.email.as_deref())
        .bind(identity.avatar_url.as_deref())
        .bind(&identity.provider_id)
        .bind(&identity.provider_user_id)
        .bind(&identity.provider_user_id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                provider = %identity.provider_id,
                provider_id = %identity.provider_user_id,
                "Database error inserting new user"
            );
            ApiError::DatabaseError(e)
        })?
        .last_insert_rowid();

        let team_name = match non_empty(&identity.display_name) {
            Some(name) => format!("{}'s Team", name),
            None => format!("Athlete {}'s Team", identity.provider_user_id),
        };

        let team_id = sqlx::query("INSERT INTO teams (name) VALUES (?)")
            .bind(&team_name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::DatabaseError)?
            .last_insert_rowid();

        sqlx::query("INSERT INTO team_members (user_id, team_id, role) VALUES (?, ?, 'owner')")
            .bind(user_id)
            .bind(team_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::DatabaseError)?;

        for action in [ActivityType::SignUp, ActivityType::CreateTeam] {
            sqlx::query(
                "INSERT INTO activity_logs (team_id, user_id, action, ip_address) VALUES (?, ?, ?, ?)",
            )
            .bind(team_id)
            .bind(user_id)
            .bind(action.as_str())
            .bind(ip_address)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::DatabaseError)?;
        }

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        info!(
            user_id = user_id,
            team_id = team_id,
            provider = %identity.provider_id,
            "Created new user account with personal team"
        );

        let user = self.find_by_id(user_id).await?.ok_or_else(|| {
            ApiError::InternalServer("newly created user not found".to_string())
        })?;

        Ok(SignInOutcome {
            user,
            team_id: Some(team_id),
            created: true,
        })
    }

    /// Persist a refreshed token bundle. Returns false when no active user
    /// matches the provider identity.
    pub async fn store_tokens(
        &self,
        provider: &str,
        provider_user_id: &str,
        tokens: &TokenBundle,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                strava_access_token = ?,
                strava_refresh_token = ?,
                strava_token_expires_at = ?,
                updated_at = datetime('now')
            WHERE provider = ? AND provider_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at.timestamp())
        .bind(provider)
        .bind(provider_user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================================================
    // Teams and activity
    // ============================================================================

    pub async fn primary_team_id(&self, user_id: i64) -> Result<Option<i64>, ApiError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT team_id FROM team_members WHERE user_id = ? ORDER BY joined_at ASC, id ASC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(row.map(|(id,)| id))
    }

    pub async fn team_for_user(&self, user_id: i64) -> Result<Option<Team>, ApiError> {
        let Some(team_id) = self.primary_team_id(user_id).await? else {
            return Ok(None);
        };

        sqlx::query_as::<_, Team>(
            "SELECT id, name, plan_name, subscription_status, created_at, updated_at FROM teams WHERE id = ?",
        )
        .bind(team_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn team_members(&self, team_id: i64) -> Result<Vec<TeamMember>, ApiError> {
        sqlx::query_as::<_, TeamMember>(
            "SELECT id, user_id, team_id, role, joined_at FROM team_members WHERE team_id = ? ORDER BY id ASC",
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Record an action against the user's team. Users without a team are
    /// skipped (returns false).
    pub async fn log_activity(
        &self,
        user_id: i64,
        action: ActivityType,
        ip_address: Option<&str>,
    ) -> Result<bool, ApiError> {
        let Some(team_id) = self.primary_team_id(user_id).await? else {
            debug!(user_id = user_id, action = %action, "No team for user, activity not logged");
            return Ok(false);
        };

        sqlx::query(
            "INSERT INTO activity_logs (team_id, user_id, action, ip_address) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(ip_address)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user_id, action = %action, "Database error logging activity");
            ApiError::DatabaseError(e)
        })?;

        Ok(true)
    }

    /// Most recent activity of the user's team, newest first
    pub async fn recent_activity(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, ApiError> {
        let Some(team_id) = self.primary_team_id(user_id).await? else {
            return Ok(Vec::new());
        };

        sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, team_id, user_id, action, timestamp, ip_address
            FROM activity_logs
            WHERE team_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
