//! Tests for users module
//!
//! Provider sign-in, token persistence and the activity log against an
//! in-memory SQLite database.

use chrono::{Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::models::ActivityType;
use super::services::UsersService;
use crate::auth::models::{ExternalIdentity, TokenBundle};
use crate::common::{migrations::run_migrations, ApiError};

async fn test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    run_migrations(&pool).await.expect("migrations");
    pool
}

fn identity(id: &str, name: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider_id: "strava".to_string(),
        provider_user_id: id.to_string(),
        display_name: name.to_string(),
        avatar_url: None,
        email: None,
    }
}

fn tokens(access: &str, refresh: &str) -> TokenBundle {
    TokenBundle {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: Utc::now() + Duration::hours(6),
    }
}

#[tokio::test]
async fn first_sign_in_creates_user_with_team() {
    let service = UsersService::new(test_db().await);

    let outcome = service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a1", "r1"), Some("10.0.0.1"))
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.user.role, "owner");
    assert_eq!(outcome.user.strava_id.as_deref(), Some("42"));
    assert_eq!(outcome.user.strava_access_token.as_deref(), Some("a1"));
    assert!(outcome.user.email.is_none());

    let team = service.team_for_user(outcome.user.id).await.unwrap().unwrap();
    assert_eq!(Some(team.id), outcome.team_id);
    assert_eq!(team.name, "Jane Doe's Team");

    let members = service.team_members(team.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, "owner");

    let actions: Vec<String> = service
        .recent_activity(outcome.user.id, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|log| log.action)
        .collect();
    assert!(actions.contains(&"SIGN_UP".to_string()));
    assert!(actions.contains(&"CREATE_TEAM".to_string()));
}

#[tokio::test]
async fn repeat_sign_in_links_existing_account() {
    let service = UsersService::new(test_db().await);

    let first = service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a1", "r1"), None)
        .await
        .unwrap();
    let second = service
        .sign_in_with_provider(&identity("42", "Jane Smith"), &tokens("a2", "r2"), None)
        .await
        .unwrap();

    assert!(!second.created);
    assert_eq!(first.user.id, second.user.id);
    assert_eq!(second.user.name.as_deref(), Some("Jane Smith"));
    assert_eq!(second.user.strava_refresh_token.as_deref(), Some("r2"));
    assert_eq!(second.team_id, first.team_id);

    let logs = service.recent_activity(second.user.id, 1).await.unwrap();
    assert_eq!(logs[0].action, ActivityType::SignIn.as_str());
}

#[tokio::test]
async fn numeric_ids_do_not_collide_across_athletes() {
    let service = UsersService::new(test_db().await);

    let a = service
        .sign_in_with_provider(&identity("1", "A"), &tokens("a", "r"), None)
        .await
        .unwrap();
    let b = service
        .sign_in_with_provider(&identity("2", "B"), &tokens("b", "r"), None)
        .await
        .unwrap();

    assert_ne!(a.user.id, b.user.id);
    assert_ne!(a.team_id, b.team_id);
}

#[tokio::test]
async fn deleted_account_cannot_sign_in() {
    let db = test_db().await;
    let service = UsersService::new(db.clone());

    let outcome = service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a1", "r1"), None)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET deleted_at = datetime('now') WHERE id = ?")
        .bind(outcome.user.id)
        .execute(&db)
        .await
        .unwrap();

    let result = service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a2", "r2"), None)
        .await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));

    assert!(service
        .find_active_by_provider("strava", "42")
        .await
        .unwrap()
        .is_none());
    assert!(service.find_by_provider("strava", "42").await.unwrap().is_some());
}

#[tokio::test]
async fn store_tokens_updates_active_user_only() {
    let service = UsersService::new(test_db().await);
    service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a1", "r1"), None)
        .await
        .unwrap();

    let rotated = tokens("a2", "r2");
    assert!(service.store_tokens("strava", "42", &rotated).await.unwrap());
    assert!(!service.store_tokens("strava", "999", &rotated).await.unwrap());

    let user = service
        .find_active_by_provider("strava", "42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.strava_access_token.as_deref(), Some("a2"));
    assert_eq!(user.strava_refresh_token.as_deref(), Some("r2"));
    assert_eq!(user.strava_token_expires_at, Some(rotated.expires_at.timestamp()));
}

#[tokio::test]
async fn activity_is_skipped_for_user_without_team() {
    let db = test_db().await;
    let service = UsersService::new(db.clone());

    let user_id = sqlx::query("INSERT INTO users (name, role) VALUES ('Loner', 'member')")
        .execute(&db)
        .await
        .unwrap()
        .last_insert_rowid();

    let logged = service
        .log_activity(user_id, ActivityType::SignIn, None)
        .await
        .unwrap();
    assert!(!logged);
    assert!(service.recent_activity(user_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_activity_is_newest_first_and_limited() {
    let service = UsersService::new(test_db().await);
    let outcome = service
        .sign_in_with_provider(&identity("42", "Jane Doe"), &tokens("a1", "r1"), None)
        .await
        .unwrap();

    assert!(service
        .log_activity(outcome.user.id, ActivityType::SignOut, Some("10.0.0.2"))
        .await
        .unwrap());

    let logs = service.recent_activity(outcome.user.id, 2).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, "SIGN_OUT");
    assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.2"));
}
