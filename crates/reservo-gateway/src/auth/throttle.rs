//! Per-identifier login throttle.
//!
//! Attempts are timestamps in a sliding window, kept behind the
//! [`AttemptStore`] trait. [`MemoryAttemptStore`] is process-local: it
//! forgets everything on restart, is not shared between instances and
//! never evicts idle keys.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuthConfig, AuthError};

/// Outcome of recording an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Attempt recorded.
    Allowed {
        /// Attempts left in the current window.
        remaining: usize,
    },
    /// Window is full; nothing recorded.
    Blocked {
        /// Time until the oldest attempt ages out.
        retry_after: Duration,
    },
}

/// Storage for attempt timestamps.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Check the window for `key` and record the attempt if there is room.
    /// Check and record happen atomically.
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> ThrottleDecision;

    /// Forget every attempt for `key`.
    async fn clear(&self, key: &str);
}

/// In-memory attempt store.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl MemoryAttemptStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.lock().map_or(0, |map| map.len())
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> ThrottleDecision {
        let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        let mut map = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries = map.entry(key.to_string()).or_default();

        while entries.front().is_some_and(|t| *t + window <= now) {
            entries.pop_front();
        }

        if entries.len() >= limit {
            let retry_after = entries
                .front()
                .map(|oldest| (*oldest + window - now).to_std().unwrap_or_default())
                .unwrap_or_default();
            return ThrottleDecision::Blocked { retry_after };
        }

        entries.push_back(now);
        ThrottleDecision::Allowed {
            remaining: limit - entries.len(),
        }
    }

    async fn clear(&self, key: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }
}

/// Login throttle over an injected [`AttemptStore`].
#[derive(Clone)]
pub struct LoginThrottle {
    store: Arc<dyn AttemptStore>,
    window: Duration,
    limit: usize,
}

impl LoginThrottle {
    /// Create a throttle.
    #[must_use]
    pub fn new(store: Arc<dyn AttemptStore>, window: Duration, limit: usize) -> Self {
        Self {
            store,
            window,
            limit,
        }
    }

    /// In-memory throttle with the configured window and limit.
    #[must_use]
    pub fn in_memory(config: &AuthConfig) -> Self {
        Self::new(
            Arc::new(MemoryAttemptStore::new()),
            config.throttle_window,
            config.throttle_limit,
        )
    }

    /// Throttle key: lowercased email, or the caller address when absent.
    #[must_use]
    pub fn key_for(email: Option<&str>, caller: &str) -> String {
        match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => format!("email:{}", email.to_lowercase()),
            None => format!("addr:{caller}"),
        }
    }

    /// Record an attempt.
    ///
    /// # Errors
    ///
    /// Returns `TooManyAttempts` when the window is full.
    pub async fn check(&self, key: &str) -> Result<(), AuthError> {
        match self
            .store
            .hit(key, Utc::now(), self.window, self.limit)
            .await
        {
            ThrottleDecision::Allowed { .. } => Ok(()),
            ThrottleDecision::Blocked { retry_after } => {
                tracing::warn!(key, retry_after_secs = retry_after.as_secs(), "Login throttled");
                Err(AuthError::TooManyAttempts { retry_after })
            }
        }
    }

    /// Clear the key after a successful login.
    pub async fn reset(&self, key: &str) {
        self.store.clear(key).await;
    }
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle")
            .field("window", &self.window)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    #[tokio::test]
    async fn test_sixth_attempt_blocked() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();

        for i in 0..5 {
            let decision = store.hit("k", now + chrono::Duration::seconds(i), WINDOW, 5).await;
            assert_eq!(
                decision,
                ThrottleDecision::Allowed {
                    remaining: 4 - usize::try_from(i).unwrap()
                }
            );
        }

        let later = now + chrono::Duration::minutes(5);
        let decision = store.hit("k", later, WINDOW, 5).await;
        assert_eq!(
            decision,
            ThrottleDecision::Blocked {
                retry_after: Duration::from_secs(10 * 60)
            }
        );
    }

    #[tokio::test]
    async fn test_window_slides() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        for _ in 0..5 {
            store.hit("k", now, WINDOW, 5).await;
        }

        let after = now + chrono::Duration::minutes(15);
        assert!(matches!(
            store.hit("k", after, WINDOW, 5).await,
            ThrottleDecision::Allowed { remaining: 4 }
        ));
    }

    #[tokio::test]
    async fn test_keys_are_independent_and_clearable() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        for _ in 0..5 {
            store.hit("a", now, WINDOW, 5).await;
        }
        assert!(matches!(
            store.hit("b", now, WINDOW, 5).await,
            ThrottleDecision::Allowed { .. }
        ));
        assert_eq!(store.len(), 2);

        store.clear("a").await;
        assert!(matches!(
            store.hit("a", now, WINDOW, 5).await,
            ThrottleDecision::Allowed { remaining: 4 }
        ));
    }

    #[tokio::test]
    async fn test_login_throttle_errors() {
        let throttle = LoginThrottle::new(Arc::new(MemoryAttemptStore::new()), WINDOW, 2);
        throttle.check("k").await.unwrap();
        throttle.check("k").await.unwrap();
        assert!(matches!(
            throttle.check("k").await,
            Err(AuthError::TooManyAttempts { .. })
        ));

        throttle.reset("k").await;
        assert!(throttle.check("k").await.is_ok());
    }

    #[test]
    fn test_key_for() {
        assert_eq!(
            LoginThrottle::key_for(Some(" John@Example.com "), "1.2.3.4"),
            "email:john@example.com"
        );
        assert_eq!(LoginThrottle::key_for(None, "1.2.3.4"), "addr:1.2.3.4");
        assert_eq!(LoginThrottle::key_for(Some(""), "1.2.3.4"), "addr:1.2.3.4");
    }
}
