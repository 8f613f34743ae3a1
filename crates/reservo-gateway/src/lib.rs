//! # Reservo Gateway
//!
//! HTTP API server for reservation booking: token authentication,
//! role-based authorization, audit records and confirmation mail.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// HTTP routes, handlers and error mapping.
pub mod api;
/// Audit trail for sensitive actions.
pub mod audit;
/// Authentication and authorization.
pub mod auth;
/// Outbound mail.
pub mod mail;
mod middleware;
mod server;

pub use api::{ApiError, router};
pub use audit::{AuditRecord, AuditRecorder, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use auth::{AuthConfig, AuthError, AuthState, Identity, JwtManager, Permission};
pub use mail::{HttpMailer, LogMailer, MailError, Mailer};
pub use middleware::{ApiRateLimiter, ClientAddr, TrustedProxy};
pub use server::{AppState, AppStateBuilder, Gateway, GatewayConfig};

use reservo_core::{Config, StoreError};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = Gateway::from_config(&config).await?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
