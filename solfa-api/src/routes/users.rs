/// Profile endpoints
///
/// - `GET /me` - Profile of the authenticated user
/// - `PUT /me` - Update the authenticated user's username
/// - `GET /users/:id` - Profile by id

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use solfa_shared::{
    audit::AuditAction,
    auth::middleware::AuthContext,
    models::user::{UpdateUser, UserProfile},
};

/// Profile update request
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
}

/// Profile update response
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: UserProfile,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Profile of the caller, looked up by the email in its token
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .users
        .find_by_email(&auth.email)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(UserProfile::from(&user)))
}

/// Partial update of the caller's profile
///
/// # Errors
///
/// - `400 Bad Request`: Malformed JSON or a blank username
/// - `404 Not Found`: The account no longer exists
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateProfileResponse>> {
    let Json(req) = payload?;

    let username = match req.username {
        Some(name) if name.trim().is_empty() => {
            return Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
                "username",
                "Username cannot be empty",
            )]));
        }
        other => other.map(|name| name.trim().to_string()),
    };

    let current = state
        .users
        .find_by_email(&auth.email)
        .await?
        .ok_or_else(user_not_found)?;

    let user = state
        .users
        .update(current.id, UpdateUser { username })
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = user.id, "Profile updated");
    state.audit.record(AuditAction::UpdateProfile, &user.email).await;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated".to_string(),
        user: UserProfile::from(&user),
    }))
}

/// Profile by id; ids that don't parse are reported as missing
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let id: i64 = id.parse().map_err(|_| user_not_found())?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(UserProfile::from(&user)))
}
