//! Per-account lockout kept on the user record.

use chrono::{DateTime, Duration, Utc};
use reservo_core::User;

use super::AuthConfig;

/// Lockout rule: `max_attempts` consecutive failures lock the account for
/// `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lock.
    pub max_attempts: u32,
    /// Lock length.
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            duration: Duration::minutes(30),
        }
    }
}

impl LockoutPolicy {
    /// Build from auth settings.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_attempts: config.max_login_attempts.max(1),
            duration: Duration::from_std(config.lockout_duration)
                .unwrap_or_else(|_| Duration::minutes(30)),
        }
    }

    /// Record a failed verification. Returns `true` when this failure
    /// locked the account.
    ///
    /// A lock that has already lapsed restarts the count at one.
    pub fn record_failure(&self, user: &mut User, now: DateTime<Utc>) -> bool {
        if user.lock_until.is_some_and(|until| until <= now) {
            user.login_attempts = 1;
            user.lock_until = None;
        } else {
            user.login_attempts = user.login_attempts.saturating_add(1);
        }

        let locked = user.login_attempts >= self.max_attempts && user.lock_until.is_none();
        if locked {
            user.lock_until = Some(now + self.duration);
        }
        user.updated_at = now;
        locked
    }

    /// Record a successful verification.
    pub fn record_success(&self, user: &mut User, now: DateTime<Utc>) {
        user.login_attempts = 0;
        user.lock_until = None;
        user.last_login = Some(now);
        user.updated_at = now;
    }
}
