use async_trait::async_trait;

use crate::domain::{DomainError, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Return the user with this name, creating it first if needed.
    async fn register(&self, username: &str) -> Result<User, DomainError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError>;
}
