//! Input validation and sanitization shared by the gateway and the CLI.

use chrono::NaiveDate;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Maximum guests per reservation.
pub const MAX_GUESTS: u32 = 20;

/// Validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One or more fields failed validation.
    #[error("{}", .0.join("; "))]
    Fields(Vec<String>),

    /// Email is not well formed.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// Time is not `HH:MM`.
    #[error("time must be HH:MM, got '{0}'")]
    InvalidTime(String),

    /// Date lies in the past.
    #[error("date {0} is in the past")]
    DateInPast(NaiveDate),

    /// Unknown role name.
    #[error("invalid role '{0}', expected user, manager or admin")]
    InvalidRole(String),

    /// Unknown reservation status.
    #[error("invalid status '{0}', expected confirmed, cancelled or completed")]
    InvalidStatus(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| {
                    let detail = err
                        .message
                        .as_ref()
                        .map_or_else(|| err.code.to_string(), ToString::to_string);
                    format!("{field}: {detail}")
                })
            })
            .collect();
        messages.sort();
        Self::Fields(messages)
    }
}

/// Trim and lowercase an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize and check an email address.
///
/// # Errors
///
/// Returns `InvalidEmail` if the address is not well formed.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(email);
    if normalized.validate_email() {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// NFKC-normalize user text, drop control characters and trim.
///
/// Newlines survive so multi-line special requests keep their shape.
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    input
        .nfkc()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize optional text, mapping blank results to `None`.
#[must_use]
pub fn sanitize_optional(input: Option<&str>) -> Option<String> {
    input.map(sanitize_text).filter(|s| !s.is_empty())
}

/// Check a 24-hour `HH:MM` time.
///
/// # Errors
///
/// Returns `InvalidTime` for anything else.
pub fn validate_time(time: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidTime(time.to_string());
    let (hours, minutes) = time.split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(())
}

/// Reject dates before `today`.
///
/// # Errors
///
/// Returns `DateInPast` when `date < today`.
pub fn validate_booking_date(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date < today {
        Err(ValidationError::DateInPast(date))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "required"))]
        name: String,
        #[validate(range(min = 1, max = 20))]
        guests: u32,
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Foo@Bar.COM "), "foo@bar.com");
        assert_eq!(validate_email("A@b.io").unwrap(), "a@b.io");
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  hi\u{0007} there "), "hi there");
        assert_eq!(sanitize_text("line one\nline two"), "line one\nline two");
        // NFKC folds the fullwidth letters
        assert_eq!(sanitize_text("\u{FF21}\u{FF22}"), "AB");
        assert_eq!(sanitize_optional(Some("  \u{0000} ")), None);
        assert_eq!(sanitize_optional(None), None);
    }

    #[test]
    fn test_validate_time() {
        assert!(validate_time("00:00").is_ok());
        assert!(validate_time("23:59").is_ok());
        assert!(validate_time("24:00").is_err());
        assert!(validate_time("7:30").is_err());
        assert!(validate_time("12:60").is_err());
        assert!(validate_time("noon").is_err());
        assert!(validate_time("+9:30").is_err());
        assert!(validate_time("9:3").is_err());
        assert!(validate_time("12:+5").is_err());
        assert!(validate_time("-1:00").is_err());
    }

    #[test]
    fn test_booking_date() {
        let today = NaiveDate::from_ymd_opt(2030, 5, 10).unwrap();
        assert!(validate_booking_date(today, today).is_ok());
        assert!(validate_booking_date(today.succ_opt().unwrap(), today).is_ok());
        assert_eq!(
            validate_booking_date(today.pred_opt().unwrap(), today),
            Err(ValidationError::DateInPast(today.pred_opt().unwrap()))
        );
    }

    #[test]
    fn test_from_validator_errors() {
        let sample = Sample {
            name: String::new(),
            guests: 0,
        };
        let err: ValidationError = sample.validate().unwrap_err().into();
        let ValidationError::Fields(messages) = &err else {
            panic!("expected field errors, got {err:?}");
        };
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("guests: "));
        assert_eq!(messages[1], "name: required");
    }
}
