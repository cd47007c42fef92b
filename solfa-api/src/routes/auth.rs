/// Account endpoints
///
/// - `POST /signup` - Create an unverified account and mail the verification link
/// - `GET /verify?token=` - Consume a verification token
/// - `POST /login` - Exchange credentials for a session token
/// - `POST /logout` - Record the logout of a session token
///
/// Session tokens are stateless: logout does not revoke anything, the token
/// stays valid until it expires.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use solfa_shared::{
    audit::AuditAction,
    auth::{jwt, middleware::extract_bearer, password},
    models::user::CreateUser,
    notify::verification_link,
};
use tracing::{info, warn};
use validator::Validate;

/// Message for every failed login, whatever the cause
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Signup response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,

    /// New user id
    pub id: i64,
}

/// Verification query string
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
    pub email: String,

    /// Session token (24h)
    pub token: String,
}

/// Logout response
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    pub email: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /signup
/// Content-Type: application/json
///
/// {
///   "username": "clara",
///   "email": "clara@example.com",
///   "password": "s3cret!"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with `{ "message": "...", "id": 1 }`. The account stays
/// unverified until the emailed link is followed.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Email already exists
/// - `500 Internal Server Error`: Server error
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let Json(req) = payload?;

    // An existing email wins over any other input problem
    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already in use".to_string()));
    }

    req.validate()?;
    if req.username.trim().is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
            "username",
            "Username is required",
        )]));
    }

    let password_hash = password::hash_password(&req.password)?;
    let token = password::generate_verification_token();

    let user = state
        .users
        .create(CreateUser {
            username: req.username.trim().to_string(),
            email: req.email.clone(),
            password_hash,
            email_verified: false,
            verification_token: Some(token.clone()),
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "User signed up");
    state.audit.record(AuditAction::Signup, &user.email).await;

    let notifier = state.notifier.clone();
    let link = verification_link(&state.config.mail.verify_url_base, &token);
    let email = user.email.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.send_verification(&email, &link).await {
            warn!(error = %e, email = %email, "Failed to send verification email");
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created, check your email to verify the account".to_string(),
            id: user.id,
        }),
    ))
}

/// Confirm an email address
///
/// # Endpoint
///
/// ```text
/// GET /verify?token=9f86d081884c7d659a2feaa0c55ad015
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing, unknown or already used token
pub async fn verify(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let token = query.token.unwrap_or_default();
    if token.trim().is_empty() {
        return Err(ApiError::BadRequest("Invalid token".to_string()));
    }

    let user = state
        .users
        .verify_email(token.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid token".to_string()))?;

    info!(user_id = user.id, "Email verified");
    state.audit.record(AuditAction::VerifyEmail, &user.email).await;

    Ok(Json(serde_json::json!({
        "message": "Email verified",
        "email": user.email,
    })))
}

/// Login with email and password
///
/// # Endpoint
///
/// ```text
/// POST /login
/// Content-Type: application/json
///
/// {
///   "email": "clara@example.com",
///   "password": "s3cret!"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Unknown email, wrong password or unverified account
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let invalid = || ApiError::Unauthorized(INVALID_CREDENTIALS.to_string());

    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        info!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    if !user.email_verified {
        info!(user_id = user.id, "Login rejected: email not verified");
        return Err(invalid());
    }

    let claims = jwt::Claims::new(user.username.clone(), user.email.clone());
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    state.audit.record(AuditAction::Login, &user.email).await;

    Ok(Json(LoginResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        token,
    }))
}

/// Logout
///
/// Reads the token itself so that a missing token is a client error (400)
/// and a bad one is an authentication error (401).
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<LogoutResponse>> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_bearer(header)
        .map_err(|_| ApiError::BadRequest("Missing token".to_string()))?;
    let claims = jwt::validate_token(token, state.jwt_secret())?;

    state.audit.record(AuditAction::Logout, &claims.email).await;

    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
        email: claims.email,
    }))
}
