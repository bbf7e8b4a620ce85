/// Input validators
///
/// Field-level checks run by the route layer before any storage access.
/// Each returns a `ValidationError` naming the offending field.
use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_PASSWORD_BYTES;
use crate::error::ValidationError;

const MIN_HANDLE_LENGTH: usize = 3;
const MAX_HANDLE_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_URL_LENGTH: usize = 500;

lazy_static! {
    static ref HANDLE_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref URL_REGEX: Regex = Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").unwrap();
}

/// Handle: 3-50 characters of letters, digits, underscore, hyphen
pub fn validate_handle(handle: &str) -> Result<(), ValidationError> {
    let length = handle.chars().count();
    if !(MIN_HANDLE_LENGTH..=MAX_HANDLE_LENGTH).contains(&length) {
        return Err(ValidationError::policy(
            "handle",
            "Handle must be between 3 and 50 characters",
        ));
    }

    if !HANDLE_REGEX.is_match(handle) {
        return Err(ValidationError::policy(
            "handle",
            "Handle can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    Ok(())
}

/// Email: basic `local@domain.tld` shape
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::field(
            "email",
            "Please provide a valid email address",
        ));
    }

    Ok(())
}

/// Signup password policy
///
/// Requirements:
/// - At least 6 characters and at most 72 bytes (bcrypt's input limit)
/// - At least one uppercase letter, one lowercase letter, and one digit
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::policy(
            "password",
            "Password must be at least 6 characters long",
        ));
    }

    // Bytes past the limit would be silently ignored by bcrypt
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::policy(
            "password",
            "Password must be at most 72 bytes long",
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_uppercase || !has_lowercase || !has_digit {
        return Err(ValidationError::policy(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ));
    }

    Ok(())
}

/// Link title, already trimmed
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let length = title.chars().count();
    if length == 0 || length > MAX_TITLE_LENGTH {
        return Err(ValidationError::field(
            "title",
            "Title must be between 1 and 100 characters",
        ));
    }
    Ok(())
}

/// Link URL, already trimmed
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let length = url.chars().count();
    if length == 0 || length > MAX_URL_LENGTH {
        return Err(ValidationError::field(
            "url",
            "URL must be between 1 and 500 characters",
        ));
    }

    if !URL_REGEX.is_match(url) {
        return Err(ValidationError::field(
            "url",
            "URL must be a valid http or https address",
        ));
    }

    Ok(())
}

/// Link order: non-negative and within storage range
pub fn validate_order(order: i64) -> Result<i32, ValidationError> {
    if order < 0 {
        return Err(ValidationError::field(
            "order",
            "Order must be a non-negative number",
        ));
    }

    i32::try_from(order).map_err(|_| ValidationError::field("order", "Order is too large"))
}
