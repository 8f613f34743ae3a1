//! Audit trail for sensitive actions.
//!
//! [`record`] wraps a route. Once the inner handler has produced its
//! response, one [`AuditRecord`] goes to the configured [`AuditSink`]. The
//! response itself passes through untouched.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Identity;
use crate::middleware::client_addr;

/// One audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// When the response completed.
    pub timestamp: DateTime<Utc>,
    /// Acting user, if known.
    pub actor_id: Option<String>,
    /// Acting user's email, if known.
    pub actor_email: Option<String>,
    /// Action name, e.g. `reservation.delete`.
    pub action: &'static str,
    /// Resource kind, e.g. `reservation`.
    pub resource: &'static str,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Caller address.
    pub caller_address: String,
    /// Response status.
    pub status_code: u16,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Store or emit one record.
    fn record(&self, record: &AuditRecord);
}

/// Emits records as `tracing` events on target `audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::info!(
            target: "audit",
            timestamp = %record.timestamp,
            actor_id = record.actor_id.as_deref(),
            actor_email = record.actor_email.as_deref(),
            action = record.action,
            resource = record.resource,
            method = %record.method,
            path = %record.path,
            caller_address = %record.caller_address,
            status_code = record.status_code,
            user_agent = record.user_agent.as_deref(),
            "audit"
        );
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Hands out per-route audit actions over a shared sink.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    /// Create a recorder over `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Middleware state for one named action.
    #[must_use]
    pub fn action(&self, action: &'static str, resource: &'static str) -> AuditAction {
        AuditAction {
            sink: self.sink.clone(),
            action,
            resource,
        }
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

/// State for [`record`]: which action a route performs.
#[derive(Clone)]
pub struct AuditAction {
    sink: Arc<dyn AuditSink>,
    action: &'static str,
    resource: &'static str,
}

/// Audit middleware.
///
/// The actor comes from the request's [`Identity`], or from the response
/// extensions for routes that establish the identity themselves (login).
pub async fn record(State(audit): State<AuditAction>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let caller_address = client_addr(request.headers(), request.extensions());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let actor = request.extensions().get::<Identity>().cloned();

    let response = next.run(request).await;

    let actor = actor.or_else(|| response.extensions().get::<Identity>().cloned());
    audit.sink.record(&AuditRecord {
        timestamp: Utc::now(),
        actor_id: actor.as_ref().map(|a| a.id.clone()),
        actor_email: actor.map(|a| a.email),
        action: audit.action,
        resource: audit.resource,
        method,
        path,
        caller_address,
        status_code: response.status().as_u16(),
        user_agent,
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::delete,
    };
    use crate::middleware::TrustedProxy;
    use reservo_core::UserRole;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_records_status_and_actor() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone());

        let app = Router::new()
            .route(
                "/things/{id}",
                delete(|| async { StatusCode::NOT_FOUND })
                    .layer(from_fn_with_state(recorder.action("thing.delete", "thing"), record)),
            )
            .layer(axum::middleware::from_fn(
                |mut request: Request, next: Next| async move {
                    request.extensions_mut().insert(TrustedProxy);
                    request.extensions_mut().insert(Identity {
                        id: "u1".to_string(),
                        name: "Admin".to_string(),
                        email: "admin@example.com".to_string(),
                        role: UserRole::Admin,
                    });
                    next.run(request).await
                },
            ));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/things/42")
                    .header("x-forwarded-for", "10.0.0.7")
                    .header("user-agent", "tests")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let entry = &records[0];
        assert_eq!(entry.action, "thing.delete");
        assert_eq!(entry.status_code, 404);
        assert_eq!(entry.actor_email.as_deref(), Some("admin@example.com"));
        assert_eq!(entry.caller_address, "10.0.0.7");
        assert_eq!(entry.path, "/things/42");
        assert_eq!(entry.user_agent.as_deref(), Some("tests"));
    }

    #[test]
    fn test_record_shape() {
        let record = AuditRecord {
            timestamp: Utc::now(),
            actor_id: None,
            actor_email: None,
            action: "auth.login",
            resource: "session",
            method: "POST".to_string(),
            path: "/api/auth/login".to_string(),
            caller_address: "unknown".to_string(),
            status_code: 401,
            user_agent: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["statusCode"], 401);
        assert!(value.get("callerAddress").is_some());
        assert!(value.get("actorId").is_some());
    }
}
