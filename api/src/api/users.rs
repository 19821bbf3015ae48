use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::{AppError, AppState, ErrorResponse};
use crate::models::UserInfo;

/// Register a device, or refresh its notification token.
#[utoipa::path(
    post,
    path = "/api/register-user",
    request_body = UserInfo,
    responses(
        (status = 204, description = "User registered"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(user): Json<UserInfo>,
) -> Result<StatusCode, AppError> {
    state.store.upsert_user(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
