//! JWT token management.
//!
//! Access and refresh tokens are signed with different secrets, so a token
//! of one kind never verifies as the other.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use rand::RngCore;
use reservo_core::UserRole;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AuthConfig;
use super::AuthError;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Email, access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role, access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Token kind.
    pub typ: TokenKind,
}

/// Token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Access token for API calls.
    Access,
    /// Refresh token for getting new access tokens.
    Refresh,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT manager for creating and validating tokens.
pub struct JwtManager {
    access: KeyPair,
    refresh: KeyPair,
    access_expiry: Duration,
    refresh_expiry: Duration,
    validation: Validation,
}

impl JwtManager {
    /// Create a manager from two distinct secrets.
    ///
    /// # Errors
    ///
    /// Returns error if either secret is empty or both are equal.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_expiry: Duration,
        refresh_expiry: Duration,
    ) -> Result<Self, AuthError> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(AuthError::Config("JWT secrets must not be empty".to_string()));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::Config(
                "Access and refresh secrets must differ".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            access: KeyPair::new(access_secret),
            refresh: KeyPair::new(refresh_secret),
            access_expiry,
            refresh_expiry,
            validation,
        })
    }

    /// Create a manager from configured secrets.
    ///
    /// # Errors
    ///
    /// Returns error if the secrets are unusable.
    pub fn from_secrets(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        config: &AuthConfig,
    ) -> Result<Self, AuthError> {
        Self::new(
            access_secret.expose_secret().as_bytes(),
            refresh_secret.expose_secret().as_bytes(),
            config.access_expiry,
            config.refresh_expiry,
        )
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(
        &self,
        kind: TokenKind,
        user_id: &str,
        email: Option<&str>,
        role: Option<UserRole>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let lifetime = match kind {
            TokenKind::Access => self.access_expiry,
            TokenKind::Refresh => self.refresh_expiry,
        };
        let now = Utc::now();
        let exp = now + chrono::Duration::from_std(lifetime).unwrap_or_default();

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            typ: kind,
        };

        let token = encode(&Header::default(), &claims, &self.keys(kind).encoding)
            .map_err(|e| AuthError::Token(format!("Encoding failed: {e}")))?;

        Ok((token, exp))
    }

    /// Issue a 15-minute access token.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_access(
        &self,
        user_id: &str,
        email: &str,
        role: UserRole,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        self.issue(TokenKind::Access, user_id, Some(email), Some(role))
    }

    /// Issue a 7-day refresh token carrying only the subject.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_refresh(&self, user_id: &str) -> Result<(String, DateTime<Utc>), AuthError> {
        self.issue(TokenKind::Refresh, user_id, None, None)
    }

    /// Verify a token of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for an expired but otherwise valid token and
    /// `InvalidToken` for anything else that fails.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        if data.claims.typ != kind {
            return Err(AuthError::InvalidToken);
        }

        Ok(data.claims)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish_non_exhaustive()
    }
}
