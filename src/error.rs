/// Unified error handling
///
/// Every failure a request can hit maps onto one `AppError` variant:
/// 1. Validation / policy errors (400, field-keyed detail)
/// 2. Uniqueness conflicts on handle or email (400)
/// 3. Authentication failures (401)
/// 4. Ownership misses and unknown resources (404)
/// 5. Storage and internal faults (500, detail only in development)
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::collections::BTreeMap;
use std::fmt;

use crate::storage::StoreError;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Whether a validation failure is malformed input or a policy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Input,
    Policy,
}

/// Malformed or policy-violating input, with per-field messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
    pub errors: BTreeMap<String, String>,
}

impl ValidationError {
    /// Single malformed field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.clone());
        Self {
            kind: ValidationKind::Input,
            message,
            errors,
        }
    }

    /// Single field violating a password or handle rule
    pub fn policy(field: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Policy,
            ..Self::field(field, message)
        }
    }

    /// Several required fields absent at once
    pub fn missing(fields: &[&str], message: impl Into<String>) -> Self {
        let errors = fields
            .iter()
            .map(|field| (field.to_string(), format!("{} is required", capitalize(field))))
            .collect();
        Self {
            kind: ValidationKind::Input,
            message: message.into(),
            errors,
        }
    }

    /// Re-key every field message under `field`
    pub fn for_field(mut self, field: &str) -> Self {
        self.errors = self
            .errors
            .into_values()
            .map(|message| (field.to_string(), message))
            .collect();
        self
    }

    /// Failure without a specific field (e.g. unparseable body)
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Input,
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Identity field whose uniqueness was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Handle,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Handle => write!(f, "Handle already exists"),
            UniqueField::Email => write!(f, "Email already exists"),
        }
    }
}

/// Authentication failures. Every variant renders as 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token - user not found")]
    PrincipalNotFound,
    /// Shared by unknown email and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("{0}")]
    Conflict(UniqueField),
    #[error("{0}")]
    Auth(AuthError),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Detail that must stay server-side unless the environment allows it
    pub fn internal_detail(&self) -> Option<&str> {
        match self {
            AppError::Database(detail) | AppError::Internal(detail) => Some(detail),
            _ => None,
        }
    }

    /// Build the JSON body, echoing internal detail only when asked to
    pub fn body(&self, expose_detail: bool) -> ErrorBody {
        let message = match self {
            AppError::Validation(e) => e.message.clone(),
            AppError::Conflict(field) => field.to_string(),
            AppError::Auth(e) => e.to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
        };

        let errors = match self {
            AppError::Validation(e) if !e.errors.is_empty() => Some(e.errors.clone()),
            _ => None,
        };

        let error = if expose_detail {
            self.internal_detail().map(str::to_string)
        } else {
            None
        };

        ErrorBody {
            success: false,
            message,
            errors,
            error,
        }
    }

    pub fn render(&self, expose_detail: bool) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body(expose_detail))
    }

    fn log(&self) {
        match self {
            AppError::Validation(e) => {
                tracing::debug!(error = %e, kind = ?e.kind, "Validation error");
            }
            AppError::Conflict(field) => {
                tracing::warn!(field = ?field, "Duplicate identity attempt");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!("Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error = %e, "Authentication error");
            }
            AppError::NotFound(msg) => {
                tracing::debug!(error = %msg, "Resource not found");
            }
            AppError::Database(detail) => {
                tracing::error!(error = %detail, "Database error");
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
            }
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(field) => AppError::Conflict(field),
            StoreError::Backend(detail) => AppError::Database(detail),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// `{success: false, message, errors?, error?}`
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detail is always suppressed here; `middleware::ErrorDetail` re-renders
/// internal failures in development.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.log();
        self.render(false)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
