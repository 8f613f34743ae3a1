//! API error type and the JSON extractor that reports through it.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reservo_core::{StoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::auth::password::PolicyViolation;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// `password` and `confirmPassword` differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Password fails the strength policy.
    #[error("Password must contain {}", join_violations(.0))]
    WeakPassword(Vec<PolicyViolation>),

    /// Email already registered.
    #[error("A user with this email already exists")]
    UserExists,

    /// Addressed record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request is well formed but not allowed in the current state.
    #[error("{0}")]
    InvalidOperation(String),

    /// General API rate limit hit.
    #[error("Too many requests, please slow down")]
    RateLimited,

    /// Storage failure.
    #[error("Storage error: {0}")]
    Store(StoreError),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ApiError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::UserExists => "USER_EXISTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::RateLimited => "RATE_LIMITED",
            Self::Store(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => e.status(),
            Self::Validation(_)
            | Self::PasswordMismatch
            | Self::WeakPassword(_)
            | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::UserExists => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // Email is the only unique key
            StoreError::Duplicate(_) => Self::UserExists,
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ValidationError::from(errors).into()
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Auth(err) = self {
            return err.into_response();
        }

        let status = self.status();
        let error = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error,
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// JSON body extractor whose rejections are `VALIDATION_ERROR`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::PasswordMismatch.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "PASSWORD_MISMATCH");
        assert_eq!(body["error"], "Passwords do not match");
    }

    #[tokio::test]
    async fn test_internal_errors_are_generic() {
        let response = ApiError::Store(StoreError::Backend("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_auth_errors_pass_through() {
        let response = ApiError::from(AuthError::TokenExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "TOKEN_EXPIRED");
    }

    #[test]
    fn test_weak_password_message() {
        let err = ApiError::WeakPassword(vec![
            PolicyViolation::MissingDigit,
            PolicyViolation::MissingSpecial,
        ]);
        assert!(err.to_string().starts_with("Password must contain a digit, one of "));
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err = ApiError::from(StoreError::Duplicate("email".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "USER_EXISTS");
    }
}
