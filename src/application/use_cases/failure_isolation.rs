use std::sync::Arc;

use tracing::error;

use crate::application::{CompletionBackend, EventSink};
use crate::domain::{DomainError, ResponseResult};

/// Longest diagnostic, in characters, embedded in a user-visible error reply.
pub const MAX_DIAGNOSTIC_CHARS: usize = 300;

const REDACTED: &str = "[REDACTED]";

/// Turns backend failures into ordinary replies so that no error escapes the
/// relay.
#[derive(Clone)]
pub struct FailureIsolation {
    backend: Arc<dyn CompletionBackend>,
}

impl FailureIsolation {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn absorb(&self, outcome: Result<ResponseResult, DomainError>) -> ResponseResult {
        match outcome {
            Ok(result) => result,
            Err(e) => self.error_result(&e),
        }
    }

    pub fn error_result(&self, error: &DomainError) -> ResponseResult {
        error!("Backend call failed: {}", error);
        ResponseResult::backend_error(&self.diagnostic(error))
    }

    /// Close a stream that failed.
    ///
    /// Before any output the stream becomes a single `Final` carrying the error
    /// text. After partial output the error text is appended as one more
    /// fragment so the `Final` still equals the concatenation of fragments.
    pub async fn absorb_stream(&self, sink: &mut EventSink, error: &DomainError) {
        if sink.is_finished() {
            return;
        }
        let failure = self.error_result(error);

        if sink.has_emitted() {
            let tail = format!("\n\n{}", failure.text());
            if sink.fragment(&tail).await {
                sink.finish(None).await;
            }
        } else {
            sink.finish_with(failure).await;
        }
    }

    /// Error detail safe to show a user: credentials removed, whitespace
    /// collapsed, length bounded.
    pub fn diagnostic(&self, error: &DomainError) -> String {
        let sanitized = self.backend.sanitize(&error.diagnostic());
        truncate_chars(&redact_credentials(&sanitized), MAX_DIAGNOSTIC_CHARS)
    }
}

/// Masks values that look like credentials: the word after `Bearer` or
/// `api-key:`, and the value of `key=` style query parameters.
pub fn redact_credentials(text: &str) -> String {
    const ASSIGNMENTS: [&str; 4] = ["api-key=", "api_key=", "apikey=", "key="];

    let mut words = Vec::new();
    let mut redact_next = false;

    for word in text.split_whitespace() {
        if redact_next {
            words.push(REDACTED.to_string());
            redact_next = false;
            continue;
        }

        let lower = word.to_ascii_lowercase();
        if lower == "bearer" || lower.trim_end_matches(':') == "api-key" {
            words.push(word.to_string());
            redact_next = true;
            continue;
        }

        match ASSIGNMENTS
            .iter()
            .find_map(|marker| lower.find(marker).map(|pos| pos + marker.len()))
        {
            Some(end) if end < word.len() => words.push(format!("{}{}", &word[..end], REDACTED)),
            _ => words.push(word.to_string()),
        }
    }

    words.join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
