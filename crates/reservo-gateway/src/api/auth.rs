//! Registration, login, token refresh and session endpoints.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::Utc;
use reservo_core::validation::{normalize_email, sanitize_text};
use reservo_core::{User, UserRole};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use super::{ApiError, ApiJson};
use crate::auth::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::{AuthError, Identity, LoginThrottle, TokenKind, password};
use crate::middleware::ClientAddr;
use crate::server::AppState;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    name: String,
    #[serde(default)]
    #[validate(email(message = "must be a valid email address"))]
    email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

pub(super) async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    body.validate()?;

    let name = sanitize_text(&body.name);
    if name.is_empty() {
        return Err(ApiError::Validation("name: name is required".to_string()));
    }
    if body.password != body.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    let violations = password::policy_violations(&body.password);
    if !violations.is_empty() {
        return Err(ApiError::WeakPassword(violations));
    }

    let email = normalize_email(&body.email);
    let users = state.storage.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::UserExists);
    }

    let hash = password::hash_password(body.password).await?;
    let user = User::new(name, &email, hash, UserRole::User);
    users.create(&user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user.to_public(),
        })),
    ))
}

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

pub(super) async fn login(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let auth = &state.auth;
    let users = state.storage.users();
    let now = Utc::now();

    let email = body
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty());
    let key = LoginThrottle::key_for(email.as_deref(), &caller);

    let user = match &email {
        Some(email) => users.find_by_email(email).await?,
        None => None,
    };

    // A locked account answers before the throttle records anything
    if let Some(until) = user
        .as_ref()
        .and_then(|u| u.lock_until)
        .filter(|until| *until > now)
    {
        return Err(AuthError::AccountLocked { until }.into());
    }

    auth.throttle.check(&key).await?;

    let (Some(_), Some(password)) = (&email, body.password.filter(|p| !p.is_empty())) else {
        return Err(ApiError::Validation(
            "email and password are required".to_string(),
        ));
    };

    let mut user = user.ok_or(AuthError::InvalidCredentials)?;
    if !user.active {
        return Err(AuthError::AccountInactive.into());
    }

    if !password::verify_password(password, user.password_hash.clone()).await {
        let locked = auth.lockout.record_failure(&mut user, now);
        users.update(&user).await?;
        if locked {
            tracing::warn!(user_id = %user.id, "Account locked after repeated failed logins");
        }
        return Err(AuthError::InvalidCredentials.into());
    }

    auth.lockout.record_success(&mut user, now);
    users.update(&user).await?;
    auth.throttle.reset(&key).await;

    let (access, expires_at) = auth.jwt.issue_access(&user.id, &user.email, user.role)?;
    let (refresh, _) = auth.jwt.issue_refresh(&user.id)?;
    let secure = auth.config.secure_cookies;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        AppendHeaders([
            (SET_COOKIE, cookies::access_cookie(&access, secure)),
            (SET_COOKIE, cookies::refresh_cookie(&refresh, secure)),
        ]),
        Extension(Identity::from_user(&user)),
        Json(json!({
            "message": "Login successful",
            "accessToken": access,
            "expiresAt": expires_at,
            "user": user.to_public(),
        })),
    )
        .into_response())
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// The body is optional; without one the `refreshToken` cookie is used.
pub(super) async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))?
            .refresh_token
    };

    let token = from_body
        .filter(|t| !t.is_empty())
        .or_else(|| cookies::read_cookie(&headers, REFRESH_COOKIE))
        .ok_or(AuthError::NoToken)?;

    let auth = &state.auth;
    let claims = auth.jwt.verify(&token, TokenKind::Refresh)?;
    let user = state
        .storage
        .users()
        .find_by_id(&claims.sub)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if !user.active {
        return Err(AuthError::UserInactive.into());
    }

    let (access, expires_at) = auth.jwt.issue_access(&user.id, &user.email, user.role)?;
    tracing::debug!(user_id = %user.id, "Access token refreshed");

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            cookies::access_cookie(&access, auth.config.secure_cookies),
        )]),
        Json(json!({
            "accessToken": access,
            "expiresAt": expires_at,
        })),
    )
        .into_response())
}

/// Clears both cookies. Issued tokens stay valid until they expire.
pub(super) async fn logout(State(state): State<AppState>, identity: Identity) -> Response {
    let secure = state.auth.config.secure_cookies;
    tracing::info!(user_id = %identity.id, "User logged out");

    (
        AppendHeaders([
            (SET_COOKIE, cookies::clear_cookie(ACCESS_COOKIE, secure)),
            (SET_COOKIE, cookies::clear_cookie(REFRESH_COOKIE, secure)),
        ]),
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response()
}

pub(super) async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .storage
        .users()
        .find_by_id(&identity.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(json!({ "user": user.to_public() })))
}
