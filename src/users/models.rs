//! User, team and activity log data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// User database model.
///
/// Strava token columns are written verbatim from the token bundle and
/// never serialized into API responses.
#[derive(FromRow, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub avatar: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub strava_id: Option<String>,
    #[serde(skip_serializing, default)]
    pub strava_access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub strava_refresh_token: Option<String>,
    pub strava_token_expires_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("provider", &self.provider)
            .field("provider_id", &self.provider_id)
            .field("strava_token_expires_at", &self.strava_token_expires_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub plan_name: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct TeamMember {
    pub id: i64,
    pub user_id: i64,
    pub team_id: i64,
    pub role: String,
    pub joined_at: String,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ActivityLog {
    pub id: i64,
    pub team_id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub timestamp: String,
    pub ip_address: Option<String>,
}

/// Actions recorded in `activity_logs.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    SignUp,
    SignIn,
    SignOut,
    UpdatePassword,
    DeleteAccount,
    UpdateAccount,
    CreateTeam,
    RemoveTeamMember,
    InviteTeamMember,
    AcceptInvitation,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::SignUp => "SIGN_UP",
            ActivityType::SignIn => "SIGN_IN",
            ActivityType::SignOut => "SIGN_OUT",
            ActivityType::UpdatePassword => "UPDATE_PASSWORD",
            ActivityType::DeleteAccount => "DELETE_ACCOUNT",
            ActivityType::UpdateAccount => "UPDATE_ACCOUNT",
            ActivityType::CreateTeam => "CREATE_TEAM",
            ActivityType::RemoveTeamMember => "REMOVE_TEAM_MEMBER",
            ActivityType::InviteTeamMember => "INVITE_TEAM_MEMBER",
            ActivityType::AcceptInvitation => "ACCEPT_INVITATION",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of signing in through a provider
#[derive(Debug)]
pub struct SignInOutcome {
    pub user: User,
    pub team_id: Option<i64>,
    /// true when this sign-in created the account
    pub created: bool,
}
