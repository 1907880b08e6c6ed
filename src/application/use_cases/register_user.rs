use std::sync::Arc;

use tracing::info;

use crate::application::UserRepository;
use crate::domain::{DomainError, User};

/// Use case for registering (or looking up) a user by name.
pub struct RegisterUserUseCase {
    user_repo: Arc<dyn UserRepository>,
}

impl RegisterUserUseCase {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn execute(&self, username: &str) -> Result<User, DomainError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::invalid_input("Username is required"));
        }

        let user = self.user_repo.register(username).await?;
        info!("User '{}' registered with id {}", user.username(), user.id());
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        self.user_repo.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::InMemoryChatStore;

    #[tokio::test]
    async fn test_register_is_get_or_create() {
        let use_case = RegisterUserUseCase::new(Arc::new(InMemoryChatStore::new()));

        let first = use_case.execute("  alice ").await.unwrap();
        let again = use_case.execute("alice").await.unwrap();

        assert_eq!(first.username(), "alice");
        assert_eq!(first.id(), again.id());
        assert_eq!(use_case.get_by_id(first.id()).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_blank_username_rejected() {
        let use_case = RegisterUserUseCase::new(Arc::new(InMemoryChatStore::new()));

        let err = use_case.execute("   ").await.unwrap_err();
        assert!(err.is_invalid_input());
    }
}
