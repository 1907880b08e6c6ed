//! Backend-facing message and response shapes.
//!
//! Requests are expressed as a logical message list plus a [`Strategy`]; the
//! HTTP adapter renders them for the selected endpoint. Responses come back as
//! one of two structurally different shapes, modelled as [`BackendResponse`].

use serde::{Deserialize, Serialize};

use super::{InstructionRole, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    User,
    Assistant,
    Developer,
    System,
}

impl BackendRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendRole::User => "user",
            BackendRole::Assistant => "assistant",
            BackendRole::Developer => "developer",
            BackendRole::System => "system",
        }
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self, BackendRole::Developer | BackendRole::System)
    }
}

impl From<InstructionRole> for BackendRole {
    fn from(role: InstructionRole) -> Self {
        match role {
            InstructionRole::Developer => BackendRole::Developer,
            InstructionRole::System => BackendRole::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    /// `data:<mime>;base64,<payload>`
    ImageUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMessage {
    pub role: BackendRole,
    pub content: MessageContent,
}

impl BackendMessage {
    pub fn text(role: BackendRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn parts(role: BackendRole, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn has_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|part| matches!(part, ContentPart::ImageUrl(_))),
        }
    }

    /// Plain text of the message; image parts are skipped.
    pub fn plain_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    ContentPart::ImageUrl(_) => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Everything the backend adapter needs to perform one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub strategy: Strategy,
    pub messages: Vec<BackendMessage>,
}

impl BackendRequest {
    pub fn new(strategy: Strategy, messages: Vec<BackendMessage>) -> Self {
        Self { strategy, messages }
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// A one-shot backend reply, discriminated by its `object` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object")]
pub enum BackendResponse {
    #[serde(rename = "chat.completion")]
    ChoiceList(ChatCompletion),
    #[serde(rename = "response")]
    OutputList(ResponseOutput),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseOutput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Older API versions report the summary as a top-level string.
    #[serde(default)]
    pub reasoning_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        role: String,
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText {
        text: String,
    },
    Refusal {
        refusal: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPart {
    #[serde(default)]
    pub text: String,
}

/// One normalized event from a streamed backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStreamEvent {
    TextDelta(String),
    ReasoningSummaryDelta(String),
    /// A complete reasoning summary delivered as one marked chunk.
    ReasoningSummary(String),
    Done,
    /// Keep-alives, metadata and event types the relay has no use for.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_choice_list_shape() {
        let json = r#"{
            "object": "chat.completion",
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hi there!"}, "finish_reason": "stop"}
            ]
        }"#;

        let response: BackendResponse = serde_json::from_str(json).unwrap();
        match response {
            BackendResponse::ChoiceList(completion) => {
                assert_eq!(completion.choices.len(), 1);
                assert_eq!(completion.choices[0].message.content.as_deref(), Some("Hi there!"));
            }
            BackendResponse::OutputList(_) => panic!("expected choice list"),
        }
    }

    #[test]
    fn test_parses_output_list_shape_with_unknown_items() {
        let json = r#"{
            "object": "response",
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": [{"type": "summary_text", "text": "steps..."}]},
                {"type": "web_search_call", "id": "ws_1"},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Answer", "annotations": []}
                ]}
            ]
        }"#;

        let response: BackendResponse = serde_json::from_str(json).unwrap();
        let BackendResponse::OutputList(output) = response else {
            panic!("expected output list");
        };
        assert_eq!(output.output.len(), 3);
        assert_eq!(output.output[1], OutputItem::Other);
    }

    #[test]
    fn test_rejects_unknown_object_tag() {
        let json = r#"{"object": "list", "data": []}"#;
        assert!(serde_json::from_str::<BackendResponse>(json).is_err());
    }

    #[test]
    fn test_plain_text_skips_images() {
        let message = BackendMessage::parts(
            BackendRole::User,
            vec![
                ContentPart::Text("what is this?".to_string()),
                ContentPart::ImageUrl("data:image/png;base64,AAAA".to_string()),
            ],
        );
        assert!(message.has_image());
        assert_eq!(message.plain_text(), "what is this?");
    }
}
