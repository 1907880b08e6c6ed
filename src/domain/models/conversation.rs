use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Developer => "developer",
        }
    }

    /// Parses a role name. Returns `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "developer" => Some(Role::Developer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One historical message supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    text: String,
    /// Base64 payload; only ever set on user turns.
    image: Option<String>,
}

impl ConversationTurn {
    /// Builds a turn. An image is kept only for user turns.
    pub fn new(role: Role, text: impl Into<String>, image: Option<String>) -> Self {
        let image = match role {
            Role::User => image.filter(|data| !data.is_empty()),
            Role::Assistant | Role::Developer => None,
        };
        Self {
            role,
            text: text.into(),
            image,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, None)
    }

    pub fn user_with_image(text: impl Into<String>, image: impl Into<String>) -> Self {
        Self::new(Role::User, text, Some(image.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, None)
    }

    pub fn developer(text: impl Into<String>) -> Self {
        Self::new(Role::Developer, text, None)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse(" Assistant "), Some(Role::Assistant));
        assert_eq!(Role::parse("developer"), Some(Role::Developer));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_image_only_kept_on_user_turns() {
        let user = ConversationTurn::new(Role::User, "look", Some("aGVsbG8=".to_string()));
        let assistant = ConversationTurn::new(Role::Assistant, "ok", Some("aGVsbG8=".to_string()));

        assert_eq!(user.image(), Some("aGVsbG8="));
        assert!(!assistant.has_image());
    }

    #[test]
    fn test_empty_image_is_dropped() {
        let turn = ConversationTurn::new(Role::User, "hi", Some(String::new()));
        assert!(!turn.has_image());
    }
}
