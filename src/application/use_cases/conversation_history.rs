use std::sync::Arc;

use tracing::info;

use crate::application::MessageRepository;
use crate::domain::{DomainError, StoredMessage};

/// Read and reset a user's stored conversation.
pub struct ConversationHistoryUseCase {
    message_repo: Arc<dyn MessageRepository>,
}

impl ConversationHistoryUseCase {
    pub fn new(message_repo: Arc<dyn MessageRepository>) -> Self {
        Self { message_repo }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<StoredMessage>, DomainError> {
        self.message_repo.list_messages(user_id).await
    }

    pub async fn clear(&self, user_id: i64) -> Result<(), DomainError> {
        self.message_repo.clear_messages(user_id).await?;
        info!("Cleared conversation for user {}", user_id);
        Ok(())
    }

    /// Image payload attached to a message. When `user_id` is given the
    /// message must belong to that user.
    pub async fn image(&self, message_id: i64, user_id: Option<i64>) -> Result<String, DomainError> {
        let message = self
            .message_repo
            .find_message(message_id)
            .await?
            .filter(|m| user_id.map_or(true, |uid| m.user_id() == uid))
            .ok_or_else(|| DomainError::not_found(format!("Message not found: {}", message_id)))?;

        message
            .image()
            .map(String::from)
            .ok_or_else(|| DomainError::not_found(format!("Message {} has no image", message_id)))
    }
}
