//! Password hashing and strength policy.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::AuthError;

/// Minimum password length in characters.
pub const MIN_LENGTH: usize = 8;

/// Characters that satisfy the special-character clause.
pub const SPECIAL_CHARACTERS: &str = "@$!%*?&#^()-_=+";

/// A password policy clause that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Fewer than eight characters.
    TooShort,
    /// No lowercase letter.
    MissingLowercase,
    /// No uppercase letter.
    MissingUppercase,
    /// No digit.
    MissingDigit,
    /// None of the special characters.
    MissingSpecial,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort => write!(f, "at least {MIN_LENGTH} characters"),
            Self::MissingLowercase => f.write_str("a lowercase letter"),
            Self::MissingUppercase => f.write_str("an uppercase letter"),
            Self::MissingDigit => f.write_str("a digit"),
            Self::MissingSpecial => write!(f, "one of {SPECIAL_CHARACTERS}"),
        }
    }
}

/// Every policy clause the password fails.
#[must_use]
pub fn policy_violations(password: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    if password.chars().count() < MIN_LENGTH {
        violations.push(PolicyViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PolicyViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PolicyViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push(PolicyViolation::MissingSpecial);
    }
    violations
}

/// Whether the password satisfies every clause.
#[must_use]
pub fn meets_policy(password: &str) -> bool {
    policy_violations(password).is_empty()
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns error if hashing fails.
pub fn hash_password_sync(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(format!("Password hashing failed: {e}")))
}

/// Verify a password against a PHC hash. Malformed hashes never verify.
#[must_use]
pub fn verify_password_sync(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash on the blocking pool.
///
/// # Errors
///
/// Returns error if hashing fails or the blocking task is lost.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {e}")))?
}

/// Verify on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password_sync(&password, &hash))
        .await
        .unwrap_or(false)
}
