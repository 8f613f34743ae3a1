//! Gateway middleware: caller address and the general API rate limiter.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{Extensions, HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

use crate::api::ApiError;

/// Request extension marking `X-Forwarded-For` as set by a trusted proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedProxy;

/// Caller address.
///
/// The socket peer, unless [`TrustedProxy`] is present, in which case the
/// first `X-Forwarded-For` hop wins.
#[must_use]
pub fn client_addr(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    extensions
        .get::<TrustedProxy>()
        .and_then(|_| forwarded())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor for the caller address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_addr(&parts.headers, &parts.extensions)))
    }
}

/// Rate limiter for the API, keyed by caller address.
pub struct ApiRateLimiter {
    /// Per-client rate limiter.
    client_limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            client_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Check if a request is allowed.
    #[must_use]
    pub fn check(&self, client_id: &str) -> bool {
        self.client_limiter
            .check_key(&client_id.to_string())
            .is_ok()
    }

    /// Drop state for callers whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.client_limiter.retain_recent();
        self.client_limiter.shrink_to_fit();
    }

    /// Number of tracked callers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.client_limiter.len()
    }

    /// Whether no callers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.client_limiter.is_empty()
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new(100) // 100 requests per minute
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

/// Rate limit middleware. Answers 429 `RATE_LIMITED` once the caller's
/// quota is spent.
pub async fn rate_limit(
    State(limiter): State<Arc<ApiRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let addr = client_addr(request.headers(), request.extensions());
    if limiter.check(&addr) {
        next.run(request).await
    } else {
        tracing::warn!(caller = %addr, "API rate limit exceeded");
        ApiError::RateLimited.into_response()
    }
}
