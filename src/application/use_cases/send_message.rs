use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::application::{ChatEventStream, ChatResponseUseCase, MessageRepository};
use crate::domain::{MessageAttributes, RequestContext, ResponseResult, Role, StreamEvent};

/// A chat turn that is also recorded in the user's conversation history.
///
/// Storage failures are logged and never affect the reply.
#[derive(Clone)]
pub struct SendMessageUseCase {
    chat: ChatResponseUseCase,
    message_repo: Arc<dyn MessageRepository>,
}

impl SendMessageUseCase {
    pub fn new(chat: ChatResponseUseCase, message_repo: Arc<dyn MessageRepository>) -> Self {
        Self { chat, message_repo }
    }

    pub fn chat(&self) -> &ChatResponseUseCase {
        &self.chat
    }

    pub async fn execute(&self, user_id: Option<i64>, ctx: &RequestContext) -> ResponseResult {
        if let Some(user_id) = user_id {
            self.record_user_turn(user_id, ctx).await;
        }

        let result = self.chat.get_response(ctx).await;

        if let Some(user_id) = user_id {
            let attributes = MessageAttributes::default()
                .with_reasoning_summary(result.reasoning_summary().map(String::from));
            record(&self.message_repo, user_id, result.text(), Role::Assistant, attributes).await;
        }
        result
    }

    /// Stream a reply; the assistant turn is recorded when `Final` passes
    /// through.
    pub async fn execute_stream(&self, user_id: Option<i64>, ctx: &RequestContext) -> ChatEventStream {
        let Some(user_id) = user_id else {
            return self.chat.stream_response(ctx);
        };
        self.record_user_turn(user_id, ctx).await;

        let message_repo = self.message_repo.clone();
        self.chat
            .stream_response(ctx)
            .then(move |event| {
                let message_repo = message_repo.clone();
                async move {
                    if let StreamEvent::Final {
                        full_text,
                        reasoning_summary,
                    } = &event
                    {
                        let attributes = MessageAttributes::default()
                            .with_reasoning_summary(reasoning_summary.clone())
                            .streamed();
                        record(&message_repo, user_id, full_text, Role::Assistant, attributes).await;
                    }
                    event
                }
            })
            .boxed()
    }

    async fn record_user_turn(&self, user_id: i64, ctx: &RequestContext) {
        let attributes = MessageAttributes::default().with_image(ctx.image().map(String::from));
        record(&self.message_repo, user_id, ctx.message(), Role::User, attributes).await;
    }
}

async fn record(
    message_repo: &Arc<dyn MessageRepository>,
    user_id: i64,
    content: &str,
    role: Role,
    attributes: MessageAttributes,
) {
    match message_repo.append_message(user_id, content, role, attributes).await {
        Ok(id) => debug!("Stored {} message {} for user {}", role, id, user_id),
        Err(e) => warn!("Failed to store {} message for user {}: {}", role, user_id, e),
    }
}
