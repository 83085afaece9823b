//! Access token refresh policy
//!
//! Pure decision logic; the Strava client does the actual refresh grant.

use chrono::{DateTime, Duration, Utc};

use super::error::AuthError;
use super::models::TokenBundle;

pub const DEFAULT_SKEW_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Access token is valid beyond the skew window
    Usable,
    /// Access token is (about to be) stale; use the refresh token first
    Refresh,
    /// Stale and no refresh token: the user has to sign in again
    RefreshImpossible,
}

impl RefreshDecision {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, RefreshDecision::Usable)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    skew_window: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SKEW_WINDOW_SECS))
    }
}

impl RefreshPolicy {
    pub fn new(skew_window: Duration) -> Self {
        Self { skew_window }
    }

    pub fn skew_window(&self) -> Duration {
        self.skew_window
    }

    /// Refresh is due once `now >= expires_at - skew_window`.
    pub fn needs_refresh(&self, bundle: &TokenBundle, now: DateTime<Utc>) -> RefreshDecision {
        if now < bundle.expires_at - self.skew_window {
            RefreshDecision::Usable
        } else if bundle.can_refresh() {
            RefreshDecision::Refresh
        } else {
            RefreshDecision::RefreshImpossible
        }
    }

    /// Like [`needs_refresh`](Self::needs_refresh) but turns the terminal case
    /// into an error so callers cannot fall through with a stale token.
    pub fn check(&self, bundle: &TokenBundle, now: DateTime<Utc>) -> Result<bool, AuthError> {
        match self.needs_refresh(bundle, now) {
            RefreshDecision::Usable => Ok(false),
            RefreshDecision::Refresh => Ok(true),
            RefreshDecision::RefreshImpossible => Err(AuthError::RefreshImpossible),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(refresh_token: &str, expires_at: DateTime<Utc>) -> TokenBundle {
        TokenBundle {
            access_token: "a1".to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
        }
    }

    #[test]
    fn usable_well_before_expiry() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        let decision = policy.needs_refresh(&bundle("r1", now + Duration::seconds(3600)), now);
        assert_eq!(decision, RefreshDecision::Usable);
        assert!(!decision.needs_refresh());
    }

    #[test]
    fn skew_window_boundary() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        // one second outside the window
        let b = bundle("r1", now + Duration::seconds(61));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Usable);

        // exactly at expires_at - 60s
        let b = bundle("r1", now + Duration::seconds(60));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Refresh);

        let b = bundle("r1", now + Duration::seconds(30));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Refresh);
    }

    #[test]
    fn expired_with_refresh_token_needs_refresh() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        let b = bundle("r1", now - Duration::seconds(10));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Refresh);
        assert!(matches!(policy.check(&b, now), Ok(true)));
    }

    #[test]
    fn expired_without_refresh_token_is_terminal() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        let b = bundle("", now - Duration::seconds(10));
        assert_eq!(
            policy.needs_refresh(&b, now),
            RefreshDecision::RefreshImpossible
        );
        assert!(matches!(
            policy.check(&b, now),
            Err(AuthError::RefreshImpossible)
        ));
    }

    #[test]
    fn terminal_as_soon_as_skew_window_opens() {
        // Not expired yet, but nothing can renew it before it does
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        let b = bundle("", now + Duration::seconds(30));
        assert_eq!(
            policy.needs_refresh(&b, now),
            RefreshDecision::RefreshImpossible
        );

        let b = bundle("", now + Duration::seconds(61));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Usable);
    }

    #[test]
    fn fresh_token_without_refresh_token_is_still_usable() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();
        let b = bundle("", now + Duration::hours(1));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Usable);
    }

    #[test]
    fn custom_skew_window() {
        let now = Utc::now();
        let policy = RefreshPolicy::new(Duration::minutes(5));
        let b = bundle("r1", now + Duration::minutes(4));
        assert_eq!(policy.needs_refresh(&b, now), RefreshDecision::Refresh);
        assert_eq!(policy.skew_window(), Duration::minutes(5));
    }
}
