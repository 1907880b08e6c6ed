use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::StoredMessage;

use super::params::{optional_user_id, required_user_id, UserIdParam, UserQuery};
use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct MessageEntry {
    pub id: i64,
    pub content: String,
    pub role: &'static str,
    pub timestamp: i64,
    pub user_id: i64,
    pub has_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
}

impl From<&StoredMessage> for MessageEntry {
    fn from(message: &StoredMessage) -> Self {
        Self {
            id: message.id(),
            content: message.content().to_string(),
            role: message.role().as_str(),
            timestamp: message.timestamp(),
            user_id: message.user_id(),
            has_image: message.has_image(),
            reasoning_summary: message.reasoning_summary().map(String::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub status: &'static str,
    pub messages: Vec<MessageEntry>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub status: &'static str,
    pub image_data: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
}

/// `GET /api/messages?user_id=`
pub async fn list_messages(
    State(container): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Query(query) = query?;
    let user_id = required_user_id(query.user_id.as_ref())?;

    let messages = container
        .conversation_history_use_case()
        .list(user_id)
        .await?;

    Ok(Json(MessagesResponse {
        status: "success",
        messages: messages.iter().map(MessageEntry::from).collect(),
    }))
}

/// `GET /api/messages/{id}/image?user_id=`
pub async fn message_image(
    State(container): State<AppState>,
    Path(message_id): Path<i64>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Query(query) = query?;
    let user_id = optional_user_id(query.user_id.as_ref())?;

    let image_data = container
        .conversation_history_use_case()
        .image(message_id, user_id)
        .await?;

    Ok(Json(ImageResponse {
        status: "success",
        image_data,
    }))
}

/// `POST /api/messages/clear`
pub async fn clear_messages(
    State(container): State<AppState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;
    let user_id = required_user_id(request.user_id.as_ref())?;

    container
        .conversation_history_use_case()
        .clear(user_id)
        .await?;

    Ok(Json(StatusResponse { status: "success" }))
}
