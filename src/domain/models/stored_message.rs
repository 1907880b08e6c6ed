use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: i64,
    username: String,
    created_at: i64,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            created_at: current_timestamp(),
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    pub fn reconstitute(id: i64, username: String, created_at: i64) -> Self {
        Self {
            id,
            username,
            created_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Optional data stored alongside a message's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttributes {
    pub image: Option<String>,
    pub reasoning_summary: Option<String>,
    /// Set when the content came from a streamed reply.
    pub streamed: bool,
}

impl MessageAttributes {
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image.filter(|data| !data.is_empty());
        self
    }

    pub fn with_reasoning_summary(mut self, summary: Option<String>) -> Self {
        self.reasoning_summary = summary;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    id: i64,
    user_id: i64,
    role: Role,
    content: String,
    timestamp: i64,
    attributes: MessageAttributes,
}

impl StoredMessage {
    pub fn new(
        id: i64,
        user_id: i64,
        role: Role,
        content: impl Into<String>,
        attributes: MessageAttributes,
    ) -> Self {
        Self {
            id,
            user_id,
            role,
            content: content.into(),
            timestamp: current_timestamp(),
            attributes,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    pub fn reconstitute(
        id: i64,
        user_id: i64,
        role: Role,
        content: String,
        timestamp: i64,
        attributes: MessageAttributes,
    ) -> Self {
        Self {
            id,
            user_id,
            role,
            content,
            timestamp,
            attributes,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }

    pub fn image(&self) -> Option<&str> {
        self.attributes.image.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.attributes.image.is_some()
    }

    pub fn reasoning_summary(&self) -> Option<&str> {
        self.attributes.reasoning_summary.as_deref()
    }
}

pub fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
