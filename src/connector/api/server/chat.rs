use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ConversationTurn, ReasoningEffort, RequestContext, Role, StreamEvent};

use super::params::{optional_user_id, UserIdParam};
use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub developer_message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
}

impl ChatRequest {
    fn into_context(self) -> Result<RequestContext, ApiError> {
        let message = self.message.unwrap_or_default();
        let image = self.image_data.filter(|data| !data.trim().is_empty());
        if message.trim().is_empty() && image.is_none() {
            return Err(ApiError::bad_request("Message is required"));
        }

        let history: Vec<ConversationTurn> = self
            .conversation_history
            .into_iter()
            .filter_map(|entry| match Role::parse(&entry.role) {
                Some(role) => Some(ConversationTurn::new(role, entry.content, entry.image)),
                None => {
                    debug!("Skipping history entry with role '{}'", entry.role);
                    None
                }
            })
            .collect();

        let mut ctx = RequestContext::new(message)
            .with_history(history)
            .with_streaming(self.streaming);
        if let Some(image) = image {
            ctx = ctx.with_image(image);
        }
        if let Some(effort) = self.reasoning_effort.as_deref().and_then(ReasoningEffort::parse) {
            ctx = ctx.with_reasoning_effort(effort);
        }
        if let Some(developer_message) = self.developer_message {
            ctx = ctx.with_developer_message(developer_message);
        }
        if let Some(model) = self.model {
            ctx = ctx.with_model(model);
        }
        Ok(ctx)
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub status: &'static str,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
}

/// Wire form of one streamed event.
#[derive(Debug, Serialize)]
struct StreamChunk<'a> {
    chunk: &'a str,
    is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_response: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_summary: Option<&'a str>,
}

fn stream_chunk(event: &StreamEvent) -> StreamChunk<'_> {
    match event {
        StreamEvent::Fragment { text } => StreamChunk {
            chunk: text,
            is_final: false,
            full_response: None,
            reasoning_summary: None,
        },
        StreamEvent::Final {
            full_text,
            reasoning_summary,
        } => StreamChunk {
            chunk: "",
            is_final: true,
            full_response: Some(full_text),
            reasoning_summary: reasoning_summary.as_deref(),
        },
    }
}

fn sse_event(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(&stream_chunk(event)).unwrap_or_default();
    Event::default().data(data)
}

/// `POST /api/chat`: JSON reply, or server-sent events when `streaming` is set.
pub async fn chat(
    State(container): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let user_id = optional_user_id(request.user_id.as_ref())?;
    let ctx = request.into_context()?;
    let request_id = Uuid::new_v4();
    info!(%request_id, "Chat request ({})", ctx.summary());

    let use_case = container.send_message_use_case();
    if ctx.wants_streaming() {
        let events = use_case
            .execute_stream(user_id, &ctx)
            .await
            .map(move |event| {
                if event.is_final() {
                    debug!(%request_id, "Stream complete");
                }
                Ok::<Event, Infallible>(sse_event(&event))
            });
        return Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response());
    }

    let (response, reasoning_summary) = use_case.execute(user_id, &ctx).await.into_parts();
    Ok(Json(ChatResponse {
        status: "success",
        response,
        reasoning_summary,
    })
    .into_response())
}
