/// Authentication Routes
///
/// Signup, login, logout, current principal and password change.
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Principal, TOKEN_LIFETIME_LABEL};
use crate::error::{AppError, ValidationError};
use crate::middleware::AuthenticatedPrincipal;
use crate::response::ApiResponse;
use crate::routes::{missing_fields, present, present_secret};
use crate::startup::AppContext;
use crate::validators::{validate_email, validate_handle, validate_password_strength};

/// Signup request. `username` is accepted for older clients.
#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(alias = "username")]
    pub handle: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// `data` of a successful signup or login
#[derive(Serialize)]
pub struct AuthPayload {
    pub user: Principal,
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: &'static str,
}

#[derive(Serialize)]
pub struct UserPayload {
    pub user: Principal,
}

/// POST /api/auth/signup
///
/// # Errors
/// - 400: missing fields, handle/email/password rules, duplicate handle or email
/// - 500: storage or hashing fault
pub async fn signup(
    body: web::Json<SignupRequest>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let fields = (
        present(&body.handle),
        present(&body.email),
        present_secret(&body.password),
    );
    let (handle, email, password) = match fields {
        (Some(handle), Some(email), Some(password)) => (handle, email, password),
        (handle, email, password) => {
            let missing = missing_fields(&[
                ("handle", handle.is_none()),
                ("email", email.is_none()),
                ("password", password.is_none()),
            ]);
            return Err(
                ValidationError::missing(&missing, "Handle, email, and password are required").into(),
            );
        }
    };

    validate_handle(handle)?;
    validate_email(email)?;
    validate_password_strength(password)?;

    let user = context.credentials.register(handle, email, password).await?;
    let token = context.tokens.issue(&user)?;

    Ok(HttpResponse::Created().json(
        ApiResponse::data(AuthPayload {
            user,
            token,
            expires_in: TOKEN_LIFETIME_LABEL,
        })
        .with_message("User created successfully"),
    ))
}

/// POST /api/auth/login
///
/// Email only. Unknown email and wrong password share one 401 body.
pub async fn login(
    body: web::Json<LoginRequest>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let (email, password) = match (present(&body.email), present_secret(&body.password)) {
        (Some(email), Some(password)) => (email, password),
        (email, password) => {
            let missing = missing_fields(&[
                ("email", email.is_none()),
                ("password", password.is_none()),
            ]);
            return Err(ValidationError::missing(&missing, "Email and password are required").into());
        }
    };

    validate_email(email)?;

    let user = context.credentials.authenticate(email, password).await?;
    let token = context.tokens.issue(&user)?;
    tracing::info!(user_id = %user.id, "Login succeeded");

    Ok(HttpResponse::Ok().json(
        ApiResponse::data(AuthPayload {
            user,
            token,
            expires_in: TOKEN_LIFETIME_LABEL,
        })
        .with_message("Login successful"),
    ))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(AuthenticatedPrincipal(user): AuthenticatedPrincipal) -> HttpResponse {
    tracing::info!(user_id = %user.id, "Logout requested");
    HttpResponse::Ok().json(ApiResponse::message(
        "Logged out successfully. Please discard your token.",
    ))
}

/// GET /api/auth/me
pub async fn me(AuthenticatedPrincipal(user): AuthenticatedPrincipal) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::data(UserPayload { user }))
}

/// PUT /api/auth/password
pub async fn change_password(
    AuthenticatedPrincipal(user): AuthenticatedPrincipal,
    body: web::Json<ChangePasswordRequest>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let fields = (
        present_secret(&body.current_password),
        present_secret(&body.new_password),
    );
    let (current, new) = match fields {
        (Some(current), Some(new)) => (current, new),
        (current, new) => {
            let missing = missing_fields(&[
                ("current_password", current.is_none()),
                ("new_password", new.is_none()),
            ]);
            return Err(ValidationError::missing(
                &missing,
                "Current password and new password are required",
            )
            .into());
        }
    };

    validate_password_strength(new).map_err(|e| e.for_field("new_password"))?;

    context.credentials.change_password(user.id, current, new).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Password updated successfully")))
}
