use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{MessageRepository, UserRepository};
use crate::domain::{DomainError, MessageAttributes, Role, StoredMessage, User};

#[derive(Default)]
struct State {
    users: Vec<User>,
    messages: Vec<StoredMessage>,
    next_user_id: i64,
    next_message_id: i64,
}

/// Process-local user and message store. Contents are lost on exit.
pub struct InMemoryChatStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_user_id: 1,
                next_message_id: 1,
                ..State::default()
            })),
        }
    }

    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.users.is_empty() && state.messages.is_empty()
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryChatStore {
    async fn register(&self, username: &str) -> Result<User, DomainError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::invalid_input("Username is required"));
        }

        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter().find(|u| u.username() == username) {
            return Ok(user.clone());
        }

        let user = User::new(state.next_user_id, username);
        state.next_user_id += 1;
        state.users.push(user.clone());
        debug!("Created in-memory user {} ({})", user.username(), user.id());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id() == id).cloned())
    }
}

#[async_trait]
impl MessageRepository for InMemoryChatStore {
    async fn append_message(
        &self,
        user_id: i64,
        content: &str,
        role: Role,
        attributes: MessageAttributes,
    ) -> Result<i64, DomainError> {
        let mut state = self.state.lock().await;
        let id = state.next_message_id;
        state.next_message_id += 1;
        state
            .messages
            .push(StoredMessage::new(id, user_id, role, content, attributes));
        Ok(id)
    }

    async fn list_messages(&self, user_id: i64) -> Result<Vec<StoredMessage>, DomainError> {
        let state = self.state.lock().await;
        // Insertion order is chronological.
        Ok(state
            .messages
            .iter()
            .filter(|m| m.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn find_message(&self, id: i64) -> Result<Option<StoredMessage>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().find(|m| m.id() == id).cloned())
    }

    async fn clear_messages(&self, user_id: i64) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.messages.retain(|m| m.user_id() != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_are_per_user_and_ordered() {
        let store = InMemoryChatStore::new();
        store
            .append_message(1, "first", Role::User, MessageAttributes::default())
            .await
            .unwrap();
        store
            .append_message(2, "other", Role::User, MessageAttributes::default())
            .await
            .unwrap();
        store
            .append_message(1, "second", Role::Assistant, MessageAttributes::default())
            .await
            .unwrap();

        let contents: Vec<String> = store
            .list_messages(1)
            .await
            .unwrap()
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(contents, vec!["first", "second"]);

        store.clear_messages(1).await.unwrap();
        assert!(store.list_messages(1).await.unwrap().is_empty());
        assert_eq!(store.list_messages(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_reuses_existing_user() {
        let store = InMemoryChatStore::new();
        let a = store.register("bob").await.unwrap();
        let b = store.register("bob").await.unwrap();
        let c = store.register("carol").await.unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert!(store.find_by_id(99).await.unwrap().is_none());
    }
}
