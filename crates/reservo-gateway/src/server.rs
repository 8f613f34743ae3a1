//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use reservo_core::{Config, ReservationBackup, Storage};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::audit::AuditRecorder;
use crate::auth::AuthState;
use crate::mail::{Mailer, mailer_from_config};
use crate::middleware::ApiRateLimiter;

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "127.0.0.1".to_string(),
            cors: true,
        }
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            port: config.server.port,
            bind_address: config.server.bind_address.clone(),
            cors: config.server.cors,
        }
    }
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage chosen at start-up.
    pub storage: Storage,
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Reservation backup file.
    pub backup: Arc<ReservationBackup>,
    /// Outbound mail.
    pub mailer: Arc<dyn Mailer>,
    /// Sender address for outbound mail.
    pub mail_from: Arc<str>,
    /// Audit recorder.
    pub audit: AuditRecorder,
    /// General API rate limiter.
    pub rate_limiter: Arc<ApiRateLimiter>,
    /// Honour `X-Forwarded-For` for the caller address.
    pub trust_proxy: bool,
}

impl AppState {
    /// Start building state from its two required parts.
    #[must_use]
    pub fn builder(storage: Storage, auth: Arc<AuthState>) -> AppStateBuilder {
        AppStateBuilder {
            storage,
            auth,
            backup: None,
            mailer: None,
            mail_from: None,
            audit: None,
            rate_limiter: None,
            trust_proxy: false,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("backup", &self.backup.path())
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    storage: Storage,
    auth: Arc<AuthState>,
    backup: Option<Arc<ReservationBackup>>,
    mailer: Option<Arc<dyn Mailer>>,
    mail_from: Option<String>,
    audit: Option<AuditRecorder>,
    rate_limiter: Option<Arc<ApiRateLimiter>>,
    trust_proxy: bool,
}

impl AppStateBuilder {
    /// Set the reservation backup writer.
    #[must_use]
    pub fn with_backup(mut self, backup: ReservationBackup) -> Self {
        self.backup = Some(Arc::new(backup));
        self
    }

    /// Set the mailer and sender address.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        self.mailer = Some(mailer);
        self.mail_from = Some(from.into());
        self
    }

    /// Set the audit recorder.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditRecorder) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the API rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limiter = Some(Arc::new(ApiRateLimiter::new(requests_per_minute)));
        self
    }

    /// Take caller addresses from `X-Forwarded-For`.
    #[must_use]
    pub fn with_trusted_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Build the state.
    #[must_use]
    pub fn build(self) -> AppState {
        AppState {
            storage: self.storage,
            auth: self.auth,
            backup: self.backup.unwrap_or_else(|| {
                Arc::new(ReservationBackup::new(
                    Config::state_dir().join("reservations.json"),
                ))
            }),
            mailer: self
                .mailer
                .unwrap_or_else(|| Arc::new(crate::mail::LogMailer)),
            mail_from: self
                .mail_from
                .unwrap_or_else(|| "reservations@reservo.local".to_string())
                .into(),
            audit: self.audit.unwrap_or_default(),
            rate_limiter: self.rate_limiter.unwrap_or_default(),
            trust_proxy: self.trust_proxy,
        }
    }
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    state: AppState,
}

impl Gateway {
    /// Create a gateway over prepared state.
    #[must_use]
    pub const fn new(config: GatewayConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build everything from service configuration.
    ///
    /// Storage is connected (and the backend chosen) here, before anything
    /// listens.
    ///
    /// # Errors
    ///
    /// Returns error if secrets are missing or storage cannot be opened.
    pub async fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let storage = Storage::connect(config).await?;

        let auth = AuthState::initialize(config, storage.clone())
            .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?;

        let mailer = mailer_from_config(&config.mail);
        tracing::info!(mailer = mailer.name(), "Mail transport selected");

        let state = AppState::builder(storage, Arc::new(auth))
            .with_backup(ReservationBackup::new(config.backup_path()))
            .with_mailer(mailer, config.mail.from.clone())
            .with_rate_limit(config.server.rate_limit_per_minute)
            .with_trusted_proxy(config.server.trust_proxy)
            .build();

        Ok(Self::new(GatewayConfig::from(config), state))
    }

    /// Shared state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// The full HTTP application.
    #[must_use]
    pub fn app(&self) -> Router {
        let app = crate::api::router(self.state.clone()).layer(TraceLayer::new_for_http());
        if self.config.cors {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Run the gateway server until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid bind address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let cleanup = tokio::spawn(prune_rate_limiter(self.state.rate_limiter.clone()));
        tracing::info!(
            backend = %self.state.storage.kind(),
            "Reservo API listening on http://{}",
            addr
        );

        let served = axum::serve(
            listener,
            self.app().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Server(e.to_string()));
        cleanup.abort();
        served?;

        tracing::info!("Reservo API stopped");
        Ok(())
    }
}

/// Periodically forget callers whose API quota has replenished.
async fn prune_rate_limiter(limiter: Arc<ApiRateLimiter>) {
    let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        limiter.retain_recent();
        tracing::debug!(tracked = limiter.len(), "Pruned API rate limiter");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
