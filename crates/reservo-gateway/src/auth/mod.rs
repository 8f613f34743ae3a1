//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Password hashing and the password-strength policy
//! - Access and refresh tokens signed with distinct secrets
//! - Per-account lockout and the per-identifier login throttle
//! - The authorization gate: authenticate, then role, permission and
//!   ownership checks on the resolved [`Identity`]

mod config;
pub mod cookies;
mod jwt;
mod lockout;
mod middleware;
pub mod password;
mod permissions;
mod throttle;

pub use config::{AuthConfig, AuthConfigBuilder};
pub use jwt::{Claims, JwtManager, TokenKind};
pub use lockout::LockoutPolicy;
pub use middleware::{AuthState, Identity, authenticate};
pub use permissions::{Permission, role_permissions};
pub use throttle::{AttemptStore, LoginThrottle, MemoryAttemptStore, ThrottleDecision};

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token in the `Authorization` header or `accessToken` cookie.
    #[error("Authentication required")]
    NoToken,

    /// Token signature was valid but it has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// Token is malformed, badly signed or of the wrong kind.
    #[error("Invalid token")]
    InvalidToken,

    /// Token subject no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// Token subject has been deactivated.
    #[error("User account is inactive")]
    UserInactive,

    /// Role is not in the allowed set.
    #[error("Insufficient role")]
    InsufficientRole,

    /// A required permission is missing.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// Caller does not own the addressed resource.
    #[error("Not the owner of this resource")]
    NotOwner,

    /// Email or password is wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account is locked after repeated failures.
    #[error("Account is locked until {until}")]
    AccountLocked {
        /// When the lock lifts.
        until: DateTime<Utc>,
    },

    /// Account has been deactivated.
    #[error("Account is inactive")]
    AccountInactive,

    /// Login throttle tripped.
    #[error("Too many login attempts, retry in {} seconds", retry_after_secs(*.retry_after))]
    TooManyAttempts {
        /// Time until the oldest attempt leaves the window.
        retry_after: Duration,
    },

    /// Token signing failed.
    #[error("Token error: {0}")]
    Token(String),

    /// Password hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// User lookup failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Whole seconds, rounded up so clients never retry early.
fn retry_after_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

impl AuthError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoToken => "NO_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserInactive => "USER_INACTIVE",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::NotOwner => "NOT_OWNER",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::TooManyAttempts { .. } => "TOO_MANY_ATTEMPTS",
            Self::Token(_) | Self::Hashing(_) | Self::Storage(_) | Self::Config(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NoToken
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::UserNotFound
            | Self::UserInactive
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole
            | Self::InsufficientPermissions
            | Self::NotOwner
            | Self::AccountLocked { .. }
            | Self::AccountInactive => StatusCode::FORBIDDEN,
            Self::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Token(_) | Self::Hashing(_) | Self::Storage(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reservo_core::StoreError> for AuthError {
    fn from(err: reservo_core::StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            Self::TooManyAttempts { retry_after } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };

        let error = if status.is_server_error() {
            tracing::error!(error = %self, "Auth failure");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = AuthErrorResponse {
            error,
            code: self.code(),
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
