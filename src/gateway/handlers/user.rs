//! User handlers

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, ApiResult, ValidatedJson, ok};
use crate::password::hash_password;
use crate::store::{CreateUserParams, User};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    /// Letters and digits only
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(min = 6))]
    #[schema(example = "secret")]
    pub password: String,
    #[validate(length(min = 1))]
    #[schema(example = "Alice Liddell")]
    pub full_name: String,
    #[validate(email)]
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// A user without credentials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

/// Register a user
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Username or email already taken")
    ),
    tag = "User"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    if !req.username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return ApiError::bad_request("username: must be alphanumeric").into_err();
    }

    let hashed_password =
        hash_password(&req.password).map_err(|e| ApiError::internal(e.to_string()))?;

    let user = state
        .ledger
        .create_user(
            &state.request_ctx(),
            CreateUserParams {
                username: req.username,
                hashed_password,
                full_name: req.full_name,
                email: req.email,
            },
        )
        .await?;

    tracing::info!(username = %user.username, "user created");
    ok(user.into())
}
