use async_trait::async_trait;

use crate::domain::{DomainError, MessageAttributes, Role, StoredMessage};

/// Conversation history persistence, keyed by user.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a message and return its id.
    async fn append_message(
        &self,
        user_id: i64,
        content: &str,
        role: Role,
        attributes: MessageAttributes,
    ) -> Result<i64, DomainError>;

    /// All messages of a user, oldest first.
    async fn list_messages(&self, user_id: i64) -> Result<Vec<StoredMessage>, DomainError>;

    async fn find_message(&self, id: i64) -> Result<Option<StoredMessage>, DomainError>;

    async fn clear_messages(&self, user_id: i64) -> Result<(), DomainError>;
}
