//! End-to-end tests driving the router over the sled backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{Days, Utc};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use reservo_core::{ReservationBackup, Storage, User, UserRole};
use reservo_gateway::auth::password::hash_password_sync;
use reservo_gateway::auth::{LoginThrottle, MemoryAttemptStore};
use reservo_gateway::{
    AppState, AuditRecorder, AuthConfig, AuthState, JwtManager, LogMailer, MemoryAuditSink,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: AppState,
    audit: Arc<MemoryAuditSink>,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_throttle(None)
    }

    fn with_throttle(throttle: Option<LoginThrottle>) -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open_document(&dir.path().join("db")).unwrap();
        let jwt = JwtManager::new(
            b"integration-access-secret",
            b"integration-refresh-secret",
            Duration::from_secs(900),
            Duration::from_secs(3600),
        )
        .unwrap();
        let mut auth = AuthState::new(AuthConfig::default(), jwt, storage.clone());
        if let Some(throttle) = throttle {
            auth = auth.with_throttle(throttle);
        }
        let audit = Arc::new(MemoryAuditSink::new());

        let state = AppState::builder(storage, Arc::new(auth))
            .with_backup(ReservationBackup::new(dir.path().join("reservations.json")))
            .with_mailer(Arc::new(LogMailer), "bookings@example.com")
            .with_audit(AuditRecorder::new(audit.clone()))
            .with_rate_limit(10_000)
            .build();

        Self {
            app: reservo_gateway::router(state.clone()),
            state,
            audit,
            _dir: dir,
        }
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, body) = self.call(request).await;
        (status, body)
    }

    /// Store a user directly and mint an access token for it.
    async fn seed_user(&self, name: &str, email: &str, role: UserRole) -> (User, String) {
        let user = User::new(name, email, hash_password_sync("Password123!").unwrap(), role);
        self.state.storage.users().create(&user).await.unwrap();
        let (token, _) = self
            .state
            .auth
            .jwt
            .issue_access(&user.id, &user.email, user.role)
            .unwrap();
        (user, token)
    }
}

fn login_body(password: &str) -> Value {
    json!({ "email": "john@example.com", "password": password })
}

fn reservation_body() -> Value {
    let date = Utc::now().date_naive() + Days::new(7);
    json!({
        "name": "Jane Guest",
        "email": "jane@example.com",
        "phone": "555-0142",
        "date": date.to_string(),
        "time": "19:30",
        "guests": 4,
        "specialRequests": "Window seat",
        "venueName": "Harbor Room",
    })
}

#[tokio::test]
async fn test_register_login_me_and_lockout() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "name": "John Doe",
                "email": "John@Example.com",
                "password": "SecurePass123!",
                "confirmPassword": "SecurePass123!",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "john@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("loginAttempts").is_none());

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(login_body("SecurePass123!").to_string()))
        .unwrap();
    let (status, headers, body) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);
    let cookies: Vec<&str> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("SameSite=Strict")));

    let token = body["accessToken"].as_str().unwrap().to_string();
    let (status, body) = app.send("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "john@example.com");

    for _ in 0..5 {
        let (status, body) = app
            .send("POST", "/api/auth/login", None, Some(login_body("WrongPass123!")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    // Locked: even the right password is refused
    let (status, body) = app
        .send("POST", "/api/auth/login", None, Some(login_body("SecurePass123!")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");

    let logins: Vec<_> = app
        .audit
        .records()
        .into_iter()
        .filter(|r| r.action == "auth.login")
        .collect();
    assert_eq!(logins.len(), 7);
    assert_eq!(logins[0].status_code, 200);
    assert_eq!(logins[0].actor_email.as_deref(), Some("john@example.com"));
    assert_eq!(logins[6].status_code, 403);
}

#[tokio::test]
async fn test_login_throttle_answers_too_many_attempts() {
    let throttle = LoginThrottle::new(
        Arc::new(MemoryAttemptStore::new()),
        Duration::from_secs(60),
        2,
    );
    let app = TestApp::with_throttle(Some(throttle));
    let attempt = || {
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "email": "Ghost@Example.com", "password": "Wrong123!" }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _, body) = app.call(attempt()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    let (status, headers, body) = app.call(attempt()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_ATTEMPTS");
    let retry_after: u64 = headers[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // Keyed by email, so another account is unaffected
    let (status, _, _) = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "other@example.com", "password": "Wrong123!" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_after_lock_expires() {
    let app = TestApp::new();
    let (mut user, _) = app
        .seed_user("John", "john@example.com", UserRole::User)
        .await;
    user.login_attempts = 5;
    user.lock_until = Some(Utc::now() - chrono::Duration::minutes(1));
    app.state.storage.users().update(&user).await.unwrap();

    let (status, body) = app
        .send("POST", "/api/auth/login", None, Some(login_body("Password123!")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "john@example.com");

    let stored = app
        .state
        .storage
        .users()
        .find_by_id(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.login_attempts, 0);
    assert_eq!(stored.lock_until, None);
    assert!(stored.last_login.is_some());
}

#[tokio::test]
async fn test_failure_after_lapsed_lock_restarts_count() {
    let app = TestApp::new();
    let (mut user, _) = app
        .seed_user("John", "john@example.com", UserRole::User)
        .await;
    user.login_attempts = 5;
    user.lock_until = Some(Utc::now() - chrono::Duration::minutes(1));
    app.state.storage.users().update(&user).await.unwrap();

    let (status, body) = app
        .send("POST", "/api/auth/login", None, Some(login_body("Wrong123!")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");

    let stored = app
        .state
        .storage
        .users()
        .find_by_id(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.login_attempts, 1);
    assert_eq!(stored.lock_until, None);
}

fn limited_router(dir: &TempDir, trust_proxy: bool) -> Router {
    let storage = Storage::open_document(&dir.path().join("db")).unwrap();
    let jwt = JwtManager::new(
        b"integration-access-secret",
        b"integration-refresh-secret",
        Duration::from_secs(900),
        Duration::from_secs(3600),
    )
    .unwrap();
    let auth = AuthState::new(AuthConfig::default(), jwt, storage.clone());
    let state = AppState::builder(storage, Arc::new(auth))
        .with_backup(ReservationBackup::new(dir.path().join("reservations.json")))
        .with_rate_limit(2)
        .with_trusted_proxy(trust_proxy)
        .build();
    reservo_gateway::router(state)
}

async fn statuses_with_rotating_forwarded_for(app: &Router) -> Vec<StatusCode> {
    let mut statuses = Vec::new();
    for i in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header("x-forwarded-for", format!("203.0.113.{i}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        statuses.push(response.status());
    }
    statuses
}

#[tokio::test]
async fn test_api_rate_limit_ignores_untrusted_forwarded_for() {
    let dir = TempDir::new().unwrap();
    let app = limited_router(&dir, false);

    let statuses = statuses_with_rotating_forwarded_for(&app).await;
    assert_eq!(
        statuses,
        vec![
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn test_api_rate_limit_uses_forwarded_for_behind_trusted_proxy() {
    let dir = TempDir::new().unwrap();
    let app = limited_router(&dir, true);

    let statuses = statuses_with_rotating_forwarded_for(&app).await;
    assert_eq!(statuses, vec![StatusCode::UNAUTHORIZED; 3]);
}

#[tokio::test]
async fn test_register_rejections() {
    let app = TestApp::new();
    let register = |password: &str, confirm: &str| {
        json!({
            "name": "Sam",
            "email": "sam@example.com",
            "password": password,
            "confirmPassword": confirm,
        })
    };

    let (status, body) = app
        .send("POST", "/api/auth/register", None, Some(register("Abcdef1!", "Abcdef2!")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "PASSWORD_MISMATCH");

    let (status, body) = app
        .send("POST", "/api/auth/register", None, Some(register("weakpass", "weakpass")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEAK_PASSWORD");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Sam", "email": "not-an-email", "password": "Abcdef1!", "confirmPassword": "Abcdef1!" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .send("POST", "/api/auth/register", None, Some(register("Abcdef1!", "Abcdef1!")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send("POST", "/api/auth/register", None, Some(register("Abcdef1!", "Abcdef1!")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USER_EXISTS");
}

#[tokio::test]
async fn test_authentication_failures() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_TOKEN");

    let (status, body) = app.send("GET", "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let (user, _) = app.seed_user("Ria", "ria@example.com", UserRole::User).await;
    let (refresh, _) = app.state.auth.jwt.issue_refresh(&user.id).unwrap();
    let (status, body) = app.send("GET", "/api/auth/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_refresh_from_cookie_and_logout() {
    let app = TestApp::new();
    let (user, token) = app.seed_user("Ria", "ria@example.com", UserRole::User).await;
    let (refresh, _) = app.state.auth.jwt.issue_refresh(&user.id).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-token")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);
    let access = body["accessToken"].as_str().unwrap();
    assert!(
        headers[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with(&format!("accessToken={access}"))
    );
    let (status, _) = app.send("GET", "/api/auth/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refreshToken": token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);
    let cleared: Vec<&str> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_profile_ownership() {
    let app = TestApp::new();
    let (alice, alice_token) = app.seed_user("Alice", "alice@example.com", UserRole::User).await;
    let (bob, _) = app.seed_user("Bob", "bob@example.com", UserRole::User).await;
    let (_, admin_token) = app.seed_user("Root", "root@example.com", UserRole::Admin).await;

    let bob_uri = format!("/api/users/{}", bob.id);
    let alice_uri = format!("/api/users/{}", alice.id);

    let (status, body) = app.send("GET", &bob_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_OWNER");

    let (status, body) = app.send("GET", &alice_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice");

    let (status, body) = app.send("GET", &bob_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "bob@example.com");

    let (status, body) = app
        .send(
            "PUT",
            &alice_uri,
            Some(&alice_token),
            Some(json!({ "email": "BOB@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USER_EXISTS");

    let (status, body) = app
        .send(
            "PUT",
            &alice_uri,
            Some(&alice_token),
            Some(json!({ "name": "Alice Liddell", "email": "Alice.L@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice Liddell");
    assert_eq!(body["user"]["email"], "alice.l@example.com");
}

#[tokio::test]
async fn test_reservation_lifecycle() {
    let app = TestApp::new();
    let (user, user_token) = app.seed_user("Jane", "jane@example.com", UserRole::User).await;
    let (_, admin_token) = app.seed_user("Root", "root@example.com", UserRole::Admin).await;
    let (_, manager_token) = app.seed_user("Max", "max@example.com", UserRole::Manager).await;

    let (status, body) = app
        .send("POST", "/api/reservations", Some(&user_token), Some(reservation_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let reservation = &body["reservation"];
    assert_eq!(reservation["status"], "confirmed");
    assert_eq!(reservation["user"], user.id.as_str());
    assert_eq!(reservation["specialRequests"], "Window seat");
    let id = reservation["id"].as_str().unwrap().to_string();

    assert_eq!(app.state.backup.load().await.unwrap().len(), 1);

    let (status, body) = app
        .send("POST", "/api/reservations", Some(&admin_token), Some(reservation_body()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_PERMISSIONS");

    let (status, body) = app
        .send("GET", "/api/reservations/my-bookings", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = app
        .send("GET", "/api/admin/reservations", Some(&manager_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    let (status, body) = app
        .send("GET", "/api/admin/reservations", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservations"][0]["user"]["email"], "jane@example.com");

    let (status, body) = app
        .send("GET", "/api/admin/reservations?status=bogus", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let uri = format!("/api/admin/reservations/{id}");
    let (status, body) = app
        .send("PUT", &uri, Some(&admin_token), Some(json!({ "status": "pending" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send("PUT", &uri, Some(&user_token), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    let (status, body) = app
        .send("PUT", &uri, Some(&admin_token), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "cancelled");

    let (status, _) = app.send("DELETE", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.send("GET", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let actions: Vec<_> = app.audit.records().iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            "reservation.create",
            "reservation.create",
            "reservation.update",
            "reservation.update",
            "reservation.update",
            "reservation.delete",
        ]
    );
}

#[tokio::test]
async fn test_reservation_validation() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("Jane", "jane@example.com", UserRole::User).await;

    let mut body = reservation_body();
    body["guests"] = json!(25);
    let (status, response) = app
        .send("POST", "/api/reservations", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], "VALIDATION_ERROR");

    let mut body = reservation_body();
    body["time"] = json!("25:00");
    let (status, _) = app
        .send("POST", "/api/reservations", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = reservation_body();
    body["date"] = json!("2000-01-01");
    let (status, _) = app
        .send("POST", "/api/reservations", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new();
    let (admin, admin_token) = app.seed_user("Root", "root@example.com", UserRole::Admin).await;
    let (user, user_token) = app.seed_user("Jane", "jane@example.com", UserRole::User).await;

    let (status, body) = app.send("GET", "/api/admin/users", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = app.send("GET", "/api/admin/users", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    let role_uri = format!("/api/admin/users/{}/role", user.id);
    let (status, body) = app
        .send("PUT", &role_uri, Some(&admin_token), Some(json!({ "role": "superuser" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send("PUT", &role_uri, Some(&admin_token), Some(json!({ "role": "manager" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "manager");

    let own_role = format!("/api/admin/users/{}/role", admin.id);
    let (status, body) = app
        .send("PUT", &own_role, Some(&admin_token), Some(json!({ "role": "user" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    let (status, body) = app
        .send("DELETE", &format!("/api/admin/users/{}", admin.id), Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    let (status, _) = app
        .send("DELETE", &format!("/api/admin/users/{}", user.id), Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send("GET", "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_health_reports_backend() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "document");
}
