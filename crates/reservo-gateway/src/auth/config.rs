//! Authentication configuration.

use std::time::Duration;

use reservo_core::Config;

/// Access token lifetime.
const ACCESS_EXPIRY: Duration = Duration::from_secs(15 * 60);
/// Refresh token lifetime.
const REFRESH_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);
/// Login throttle window.
const THROTTLE_WINDOW: Duration = Duration::from_secs(15 * 60);
/// Attempts allowed inside one throttle window.
const THROTTLE_LIMIT: usize = 5;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access token lifetime.
    pub access_expiry: Duration,
    /// Refresh token lifetime.
    pub refresh_expiry: Duration,
    /// Failed logins before an account locks.
    pub max_login_attempts: u32,
    /// How long a lock lasts.
    pub lockout_duration: Duration,
    /// Login throttle sliding window.
    pub throttle_window: Duration,
    /// Login attempts allowed per identifier inside the window.
    pub throttle_limit: usize,
    /// Mark auth cookies `Secure`.
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_expiry: ACCESS_EXPIRY,
            refresh_expiry: REFRESH_EXPIRY,
            max_login_attempts: 5,
            lockout_duration: Duration::from_secs(30 * 60),
            throttle_window: THROTTLE_WINDOW,
            throttle_limit: THROTTLE_LIMIT,
            secure_cookies: false,
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Derive auth settings from the service configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .max_login_attempts(config.auth.max_login_attempts)
            .lockout_minutes(u64::from(config.auth.lockout_minutes))
            .secure_cookies(config.server.environment.is_production())
            .build()
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the lockout threshold.
    #[must_use]
    pub const fn max_login_attempts(mut self, attempts: u32) -> Self {
        self.config.max_login_attempts = attempts;
        self
    }

    /// Set the lockout duration in minutes.
    #[must_use]
    pub const fn lockout_minutes(mut self, minutes: u64) -> Self {
        self.config.lockout_duration = Duration::from_secs(minutes * 60);
        self
    }

    /// Set the throttle window and limit.
    #[must_use]
    pub const fn throttle(mut self, window: Duration, limit: usize) -> Self {
        self.config.throttle_window = window;
        self.config.throttle_limit = limit;
        self
    }

    /// Set whether cookies carry the `Secure` attribute.
    #[must_use]
    pub const fn secure_cookies(mut self, secure: bool) -> Self {
        self.config.secure_cookies = secure;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservo_core::Environment;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.access_expiry, Duration::from_secs(900));
        assert_eq!(config.refresh_expiry, Duration::from_secs(604_800));
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.throttle_limit, 5);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_from_config() {
        let mut core = Config::default();
        core.auth.max_login_attempts = 3;
        core.auth.lockout_minutes = 10;
        core.server.environment = Environment::Production;

        let config = AuthConfig::from_config(&core);
        assert_eq!(config.max_login_attempts, 3);
        assert_eq!(config.lockout_duration, Duration::from_secs(600));
        assert!(config.secure_cookies);
    }
}
