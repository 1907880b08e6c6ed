use serde::{Deserialize, Serialize};

use super::ConversationTurn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    /// Lenient parse used at the HTTP/CLI edge: blank or unknown values mean
    /// "no preference".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(ReasoningEffort::Low),
            "medium" => Some(ReasoningEffort::Medium),
            "high" => Some(ReasoningEffort::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a single chat call needs. Built fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    message: String,
    history: Vec<ConversationTurn>,
    image: Option<String>,
    reasoning_effort: Option<ReasoningEffort>,
    developer_message: Option<String>,
    model_id: Option<String>,
    streaming: bool,
}

impl RequestContext {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            image: None,
            reasoning_effort: None,
            developer_message: None,
            model_id: None,
            streaming: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        let image = image.into();
        self.image = (!image.is_empty()).then_some(image);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_developer_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.developer_message = (!message.trim().is_empty()).then_some(message);
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        self.model_id = (!model_id.trim().is_empty()).then(|| model_id.trim().to_string());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn reasoning_effort(&self) -> Option<ReasoningEffort> {
        self.reasoning_effort
    }

    pub fn developer_message(&self) -> Option<&str> {
        self.developer_message.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn wants_streaming(&self) -> bool {
        self.streaming
    }

    /// The turn the caller is sending now, in history form.
    pub fn current_turn(&self) -> ConversationTurn {
        ConversationTurn::new(super::Role::User, self.message.clone(), self.image.clone())
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("history={}", self.history.len())];
        parts.push(format!("model={}", self.model_id.as_deref().unwrap_or("(default)")));
        parts.push(format!("streaming={}", self.streaming));

        if self.image.is_some() {
            parts.push("image=yes".to_string());
        }
        if let Some(effort) = self.reasoning_effort {
            parts.push(format!("reasoning_effort={}", effort));
        }
        if self.developer_message.is_some() {
            parts.push("developer_message=yes".to_string());
        }

        parts.join(", ")
    }
}
