use serde::{Deserialize, Serialize};

/// Returned instead of an empty reply when no assistant text could be found.
pub const FALLBACK_RESPONSE: &str =
    "I'm sorry, I couldn't generate a proper response. Please try again.";

/// Prefix of the user-visible text produced for absorbed backend failures.
pub const BACKEND_ERROR_PREFIX: &str = "Sorry, there was an error communicating with the AI service: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseResult {
    text: String,
    reasoning_summary: Option<String>,
}

impl ResponseResult {
    pub fn new(text: impl Into<String>, reasoning_summary: Option<String>) -> Self {
        Self {
            text: text.into(),
            reasoning_summary: reasoning_summary.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    /// Result used when the backend answered but nothing usable was in it.
    pub fn fallback() -> Self {
        Self::text_only(FALLBACK_RESPONSE)
    }

    pub fn backend_error(diagnostic: &str) -> Self {
        Self::text_only(format!("{BACKEND_ERROR_PREFIX}{diagnostic}"))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning_summary(&self) -> Option<&str> {
        self.reasoning_summary.as_deref()
    }

    pub fn is_backend_error(&self) -> bool {
        self.text.starts_with(BACKEND_ERROR_PREFIX)
    }

    pub fn into_parts(self) -> (String, Option<String>) {
        (self.text, self.reasoning_summary)
    }
}

/// One element of a streamed reply. `Final` always closes the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Fragment {
        text: String,
    },
    Final {
        full_text: String,
        reasoning_summary: Option<String>,
    },
}

impl StreamEvent {
    pub fn fragment(text: impl Into<String>) -> Self {
        StreamEvent::Fragment { text: text.into() }
    }

    pub fn final_from(result: ResponseResult) -> Self {
        let (full_text, reasoning_summary) = result.into_parts();
        StreamEvent::Final {
            full_text,
            reasoning_summary,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::Final { .. })
    }

    /// Text carried by this event: the fragment, or the full text for `Final`.
    pub fn text(&self) -> &str {
        match self {
            StreamEvent::Fragment { text } => text,
            StreamEvent::Final { full_text, .. } => full_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_reasoning_summary_is_dropped() {
        let result = ResponseResult::new("Answer", Some("   ".to_string()));
        assert_eq!(result.reasoning_summary(), None);
    }

    #[test]
    fn test_backend_error_text() {
        let result = ResponseResult::backend_error("timed out");
        assert_eq!(
            result.text(),
            "Sorry, there was an error communicating with the AI service: timed out"
        );
        assert!(result.is_backend_error());
        assert!(!ResponseResult::fallback().is_backend_error());
    }

    #[test]
    fn test_final_from_result() {
        let event = StreamEvent::final_from(ResponseResult::new("done", Some("why".to_string())));
        assert!(event.is_final());
        assert_eq!(
            event,
            StreamEvent::Final {
                full_text: "done".to_string(),
                reasoning_summary: Some("why".to_string()),
            }
        );
    }
}
