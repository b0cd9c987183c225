//! User account endpoints.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use homestead_core::types::{Role, User, UserId};
use serde::Deserialize;
use uuid::Uuid;

/// Request to create a user account.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Email address
    pub email: String,
    /// Display name
    pub display_name: String,
    /// Actor role
    pub role: Role,
}

/// `POST /users`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::bad_request("email must not be empty"));
    }

    let user = User {
        id: UserId::new(),
        email: request.email,
        display_name: request.display_name,
        role: request.role,
        created_at: Utc::now(),
    };
    state.users.create(&user).await?;
    Ok(Json(user))
}

/// `GET /users/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state.users.get(UserId::from_uuid(id)).await?;
    Ok(Json(user))
}
