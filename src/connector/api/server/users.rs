use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub user_id: i64,
    pub username: String,
}

/// `POST /api/users`: get-or-create by username.
pub async fn register_user(
    State(container): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(request) = payload?;
    let user = container
        .register_user_use_case()
        .execute(&request.username)
        .await?;

    Ok(Json(RegisterResponse {
        status: "success",
        user_id: user.id(),
        username: user.username().to_string(),
    }))
}
