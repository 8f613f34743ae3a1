//! Authentication middleware and the resolved caller identity.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use reservo_core::{Config, Storage, User, UserRole};

use super::cookies::{ACCESS_COOKIE, read_cookie};
use super::jwt::{JwtManager, TokenKind};
use super::lockout::LockoutPolicy;
use super::permissions::{Permission, role_permissions};
use super::throttle::LoginThrottle;
use super::{AuthConfig, AuthError};

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// JWT manager.
    pub jwt: JwtManager,
    /// User lookup.
    pub storage: Storage,
    /// Per-account lockout rule.
    pub lockout: LockoutPolicy,
    /// Per-identifier login throttle.
    pub throttle: LoginThrottle,
}

impl AuthState {
    /// Create a new auth state with an in-memory login throttle.
    #[must_use]
    pub fn new(config: AuthConfig, jwt: JwtManager, storage: Storage) -> Self {
        Self {
            lockout: LockoutPolicy::from_config(&config),
            throttle: LoginThrottle::in_memory(&config),
            config,
            jwt,
            storage,
        }
    }

    /// Replace the login throttle.
    #[must_use]
    pub fn with_throttle(mut self, throttle: LoginThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Build auth state from service configuration.
    ///
    /// # Errors
    ///
    /// Returns error if either signing secret is missing or both are equal.
    pub fn initialize(config: &Config, storage: Storage) -> Result<Self, AuthError> {
        let (access, refresh) = config
            .require_secrets()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        let auth_config = AuthConfig::from_config(config);
        let jwt = JwtManager::from_secrets(access, refresh, &auth_config)?;
        Ok(Self::new(auth_config, jwt, storage))
    }

    /// Verify an access token and load its subject.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired`/`InvalidToken` for bad tokens, `UserNotFound`
    /// or `UserInactive` for unusable subjects.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.jwt.verify(token, TokenKind::Access)?;

        let user = self
            .storage
            .users()
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.active {
            return Err(AuthError::UserInactive);
        }

        Ok(Identity::from_user(&user))
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("backend", &self.storage.kind())
            .finish_non_exhaustive()
    }
}

/// Bearer token from `Authorization`, falling back to the access cookie.
#[must_use]
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(JwtManager::extract_from_header)
        .map(str::to_string)
        .or_else(|| read_cookie(headers, ACCESS_COOKIE))
}

/// Middleware that resolves the caller and stores an [`Identity`] in the
/// request extensions.
///
/// # Errors
///
/// Rejects the request with the matching [`AuthError`].
pub async fn authenticate(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request_token(request.headers()).ok_or(AuthError::NoToken)?;
    let identity = auth.resolve(&token).await.inspect_err(|e| {
        tracing::debug!(code = e.code(), "Authentication failed");
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Role at resolution time.
    pub role: UserRole,
}

impl Identity {
    /// Identity for a stored user.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }

    /// Check if user is admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Permissions held through the role.
    #[must_use]
    pub const fn permissions(&self) -> &'static [Permission] {
        role_permissions(self.role)
    }

    /// Require one of the `allowed` roles.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientRole` otherwise.
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<&Self, AuthError> {
        if allowed.contains(&self.role) {
            Ok(self)
        } else {
            Err(AuthError::InsufficientRole)
        }
    }

    /// Require every permission in `required`.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientPermissions` if any is missing.
    pub fn require_permissions(&self, required: &[Permission]) -> Result<&Self, AuthError> {
        let held = self.permissions();
        if required.iter().all(|p| held.contains(p)) {
            Ok(self)
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }

    /// Require that the caller is `owner_id`. Admins bypass.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner` otherwise.
    pub fn require_owner(&self, owner_id: &str) -> Result<&Self, AuthError> {
        if self.is_admin() || self.id == owner_id {
            Ok(self)
        } else {
            Err(AuthError::NotOwner)
        }
    }
}

/// Extractor implementation for `Identity`. Requires [`authenticate`] on
/// the route.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::NoToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use tempfile::TempDir;

    fn identity(role: UserRole) -> Identity {
        Identity {
            id: "user_123".to_string(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role,
        }
    }

    fn state(dir: &TempDir) -> AuthState {
        let storage = Storage::open_document(dir.path()).unwrap();
        let jwt = JwtManager::new(
            b"access-secret-0123456789",
            b"refresh-secret-0123456789",
            Duration::from_secs(900),
            Duration::from_secs(3600),
        )
        .unwrap();
        AuthState::new(AuthConfig::default(), jwt, storage)
    }

    #[test]
    fn test_role_and_permission_chain() {
        let admin = identity(UserRole::Admin);
        assert!(
            admin
                .require_role(&[UserRole::Admin])
                .and_then(|i| i.require_permissions(&[Permission::DeleteUsers]))
                .is_ok()
        );

        let manager = identity(UserRole::Manager);
        assert!(matches!(
            manager.require_role(&[UserRole::Admin]),
            Err(AuthError::InsufficientRole)
        ));
        assert!(matches!(
            manager.require_permissions(&[Permission::ViewUsers, Permission::DeleteUsers]),
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_ownership() {
        let user = identity(UserRole::User);
        assert!(user.require_owner("user_123").is_ok());
        assert!(matches!(
            user.require_owner("someone_else"),
            Err(AuthError::NotOwner)
        ));

        let admin = identity(UserRole::Admin);
        assert!(admin.require_owner("someone_else").is_ok());
    }

    #[test]
    fn test_request_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_token(&headers), None);

        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("accessToken=from-cookie"),
        );
        assert_eq!(request_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_resolve() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let mut user = User::new("Ann", "ann@example.com", "hash", UserRole::Manager);
        state.storage.users().create(&user).await.unwrap();

        let (token, _) = state
            .jwt
            .issue_access(&user.id, &user.email, user.role)
            .unwrap();
        let identity = state.resolve(&token).await.unwrap();
        assert_eq!(identity, Identity::from_user(&user));

        user.active = false;
        state.storage.users().update(&user).await.unwrap();
        assert!(matches!(
            state.resolve(&token).await,
            Err(AuthError::UserInactive)
        ));

        state.storage.users().delete(&user.id).await.unwrap();
        assert!(matches!(
            state.resolve(&token).await,
            Err(AuthError::UserNotFound)
        ));

        let (refresh, _) = state.jwt.issue_refresh(&user.id).unwrap();
        assert!(matches!(
            state.resolve(&refresh).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
