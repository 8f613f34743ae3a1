//! Configuration loading and validation.
//!
//! Config is read from a JSON5 file (`~/.reservo/reservo.json` by default)
//! and then overridden by `RESERVO_*` environment variables. Signing
//! secrets and mail credentials are only ever held as [`SecretString`] and
//! are never written back out by [`Config::save`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Outbound mail settings.
    #[serde(default)]
    pub mail: MailConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded, parsed, or overridden.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path. Secrets are not written.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("reservo.json")
    }

    /// Get the Reservo state directory.
    ///
    /// Uses `RESERVO_STATE_DIR` env var if set, otherwise `~/.reservo`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("RESERVO_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".reservo")
        } else {
            PathBuf::from(".reservo")
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or enumerated variable cannot be parsed.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or enumerated variable cannot be parsed.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("RESERVO_DATABASE_URL").or_else(|| get("DATABASE_URL")) {
            self.database.url = Some(SecretString::from(url));
        }
        if let Some(secret) = get("RESERVO_JWT_SECRET") {
            self.auth.jwt_secret = Some(SecretString::from(secret));
        }
        if let Some(secret) = get("RESERVO_JWT_REFRESH_SECRET") {
            self.auth.jwt_refresh_secret = Some(SecretString::from(secret));
        }
        if let Some(port) = get("RESERVO_PORT") {
            self.server.port = parse_env("RESERVO_PORT", &port)?;
        }
        if let Some(bind) = get("RESERVO_BIND") {
            self.server.bind_address = bind;
        }
        if let Some(env) = get("RESERVO_ENV") {
            self.server.environment = env.parse().map_err(|()| ConfigError::InvalidEnv {
                var: "RESERVO_ENV",
                value: env,
            })?;
        }
        if let Some(endpoint) = get("RESERVO_MAIL_ENDPOINT") {
            self.mail.endpoint = Some(endpoint);
        }
        if let Some(user) = get("RESERVO_MAIL_USER") {
            self.mail.user = Some(user);
        }
        if let Some(password) = get("RESERVO_MAIL_PASSWORD") {
            self.mail.password = Some(SecretString::from(password));
        }
        if let Some(from) = get("RESERVO_MAIL_FROM") {
            self.mail.from = from;
        }
        if let Some(attempts) = get("RESERVO_MAX_LOGIN_ATTEMPTS") {
            self.auth.max_login_attempts = parse_env("RESERVO_MAX_LOGIN_ATTEMPTS", &attempts)?;
        }
        if let Some(minutes) = get("RESERVO_LOCKOUT_MINUTES") {
            self.auth.lockout_minutes = parse_env("RESERVO_LOCKOUT_MINUTES", &minutes)?;
        }
        if let Some(dir) = get("RESERVO_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(limit) = get("RESERVO_RATE_LIMIT_PER_MINUTE") {
            self.server.rate_limit_per_minute =
                parse_env("RESERVO_RATE_LIMIT_PER_MINUTE", &limit)?;
        }
        if let Some(trust) = get("RESERVO_TRUST_PROXY") {
            self.server.trust_proxy = parse_env("RESERVO_TRUST_PROXY", &trust)?;
        }

        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("Server port cannot be 0".to_string()));
        }

        if self.auth.max_login_attempts == 0 {
            return Err(ConfigError::Validation(
                "maxLoginAttempts must be at least 1".to_string(),
            ));
        }

        if self.auth.lockout_minutes == 0 {
            return Err(ConfigError::Validation(
                "lockoutMinutes must be at least 1".to_string(),
            ));
        }

        if self.server.rate_limit_per_minute == 0 {
            return Err(ConfigError::Validation(
                "rateLimitPerMinute must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Check that both token signing secrets are present and distinct.
    ///
    /// There is no fallback from the refresh secret to the access secret.
    ///
    /// # Errors
    ///
    /// Returns error if either secret is missing or both are equal.
    pub fn require_secrets(&self) -> Result<(&SecretString, &SecretString), ConfigError> {
        let access = self
            .auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("RESERVO_JWT_SECRET".to_string()))?;
        let refresh = self
            .auth
            .jwt_refresh_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("RESERVO_JWT_REFRESH_SECRET".to_string()))?;

        if access.expose_secret() == refresh.expose_secret() {
            return Err(ConfigError::Validation(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok((access, refresh))
    }

    /// Directory for the sled document store and the reservation backup.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Path of the reservation backup file.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.backup_file)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Production deployment (secure cookies, JSON logs).
    Production,
}

impl Environment {
    /// Whether this is a production deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind_address: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// General API requests allowed per caller per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Take the caller address from `X-Forwarded-For`. Only enable behind a
    /// reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind(),
            environment: Environment::default(),
            cors: true,
            rate_limit_per_minute: default_rate_limit(),
            trust_proxy: false,
        }
    }
}

const fn default_port() -> u16 {
    5000
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_rate_limit() -> u32 {
    100
}

/// Relational database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. When absent the document store is used.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub url: Option<SecretString>,

    /// Start-up connectivity probe timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            probe_timeout_secs: default_probe_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Probe timeout as a `Duration`.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

const fn default_probe_timeout() -> u64 {
    5
}

const fn default_max_connections() -> u32 {
    10
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Access token signing secret.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub jwt_secret: Option<SecretString>,

    /// Refresh token signing secret.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub jwt_refresh_secret: Option<SecretString>,

    /// Failed logins before an account is locked.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,

    /// How long a locked account stays locked, in minutes.
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_refresh_secret: None,
            max_login_attempts: default_max_login_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

const fn default_max_login_attempts() -> u32 {
    5
}

const fn default_lockout_minutes() -> u32 {
    30
}

/// Outbound mail relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    /// HTTP endpoint of the mail relay. Mail is only logged when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Relay user name.
    #[serde(default)]
    pub user: Option<String>,

    /// Relay password.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Sender address.
    #[serde(default = "default_mail_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            user: None,
            password: None,
            from: default_mail_from(),
        }
    }
}

fn default_mail_from() -> String {
    "reservations@reservo.local".to_string()
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Data directory override.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Reservation backup file name, relative to the data directory.
    #[serde(default = "default_backup_file")]
    pub backup_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backup_file: default_backup_file(),
        }
    }
}

fn default_backup_file() -> String {
    "reservations.json".to_string()
}
