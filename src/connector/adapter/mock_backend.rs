use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use crate::application::{BackendEventStream, CompletionBackend};
use crate::domain::{
    BackendRequest, BackendResponse, BackendRole, BackendStreamEvent, CallFlavor, ChatCompletion,
    Choice, ChoiceMessage, DomainError, OutputContent, OutputItem, ResponseOutput, SummaryPart,
};

/// Requests kept for inspection; older ones are discarded.
pub const MAX_RECORDED_REQUESTS: usize = 64;

/// Bumps a counter when a stalled call is dropped by its caller.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deterministic in-process backend for development and tests.
///
/// Echoes the last user message unless a reply is scripted. The most recent
/// requests are recorded and can be inspected with [`MockBackend::requests`].
pub struct MockBackend {
    reply: Option<String>,
    reasoning_summary: Option<String>,
    failure: Option<(Option<CallFlavor>, String)>,
    stream_failure: Option<(Option<CallFlavor>, usize)>,
    stalling: bool,
    released: Arc<AtomicUsize>,
    requests: Mutex<VecDeque<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            reply: None,
            reasoning_summary: None,
            failure: None,
            stream_failure: None,
            stalling: false,
            released: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Summary returned by reasoning-capable calls.
    pub fn with_reasoning_summary(mut self, summary: impl Into<String>) -> Self {
        self.reasoning_summary = Some(summary.into());
        self
    }

    /// Fail every call with a backend error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some((None, message.into()));
        self
    }

    /// Fail only calls of one flavor.
    pub fn failing_for(mut self, flavor: CallFlavor, message: impl Into<String>) -> Self {
        self.failure = Some((Some(flavor), message.into()));
        self
    }

    /// Break streams after `fragments` text deltas.
    pub fn with_stream_failure_after(mut self, fragments: usize) -> Self {
        self.stream_failure = Some((None, fragments));
        self
    }

    /// Break only streams of one flavor after `fragments` text deltas.
    pub fn with_stream_failure_for(mut self, flavor: CallFlavor, fragments: usize) -> Self {
        self.stream_failure = Some((Some(flavor), fragments));
        self
    }

    /// One-shot calls never answer and streams hang after their text. Use
    /// [`MockBackend::released_calls`] to see whether the caller let go.
    pub fn stalling(mut self) -> Self {
        self.stalling = true;
        self
    }

    /// Number of stalled calls or streams dropped by their caller.
    pub fn released_calls(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn record(&self, request: &BackendRequest) -> Result<(), DomainError> {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if requests.len() == MAX_RECORDED_REQUESTS {
            requests.pop_front();
        }
        requests.push_back(request.clone());
        drop(requests);

        match &self.failure {
            Some((None, message)) => Err(DomainError::backend(message.clone())),
            Some((Some(flavor), message)) if *flavor == request.strategy.flavor => {
                Err(DomainError::backend(message.clone()))
            }
            _ => Ok(()),
        }
    }

    fn reply_for(&self, request: &BackendRequest) -> String {
        if let Some(reply) = &self.reply {
            return reply.clone();
        }
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == BackendRole::User)
            .map(|m| m.plain_text())
            .unwrap_or_default();
        format!("Echo: {}", last_user)
    }

    fn stream_failure_for(&self, request: &BackendRequest) -> Option<usize> {
        match self.stream_failure {
            Some((None, after)) => Some(after),
            Some((Some(flavor), after)) if flavor == request.strategy.flavor => Some(after),
            _ => None,
        }
    }

    fn summary_for(&self, request: &BackendRequest) -> Option<String> {
        self.reasoning_summary
            .clone()
            .filter(|_| request.strategy.flavor == CallFlavor::ReasoningCapable)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, DomainError> {
        self.record(request)?;
        if self.stalling {
            let _guard = ReleaseGuard(self.released.clone());
            return future::pending().await;
        }
        let text = self.reply_for(request);
        debug!("MockBackend: replying with {} characters", text.len());

        let response = match request.strategy.flavor {
            CallFlavor::StandardCompletion => BackendResponse::ChoiceList(ChatCompletion {
                id: Some("mock-completion".to_string()),
                model: Some(request.strategy.model.clone()),
                choices: vec![Choice {
                    index: 0,
                    message: ChoiceMessage {
                        role: "assistant".to_string(),
                        content: Some(text),
                        refusal: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
            }),
            CallFlavor::ReasoningCapable => {
                let mut output = Vec::new();
                if let Some(summary) = self.summary_for(request) {
                    output.push(OutputItem::Reasoning {
                        summary: vec![SummaryPart { text: summary }],
                    });
                }
                output.push(OutputItem::Message {
                    role: "assistant".to_string(),
                    content: vec![OutputContent::OutputText { text }],
                });
                BackendResponse::OutputList(ResponseOutput {
                    id: Some("mock-response".to_string()),
                    model: Some(request.strategy.model.clone()),
                    status: Some("completed".to_string()),
                    output,
                    reasoning_summary: None,
                })
            }
        };
        Ok(response)
    }

    async fn stream(&self, request: &BackendRequest) -> Result<BackendEventStream, DomainError> {
        self.record(request)?;
        let text = self.reply_for(request);

        let mut events: Vec<Result<BackendStreamEvent, DomainError>> = Vec::new();
        if let Some(summary) = self.summary_for(request) {
            events.push(Ok(BackendStreamEvent::ReasoningSummaryDelta(summary.clone())));
            events.push(Ok(BackendStreamEvent::ReasoningSummary(summary)));
        }
        let failure_after = self.stream_failure_for(request);
        for (i, piece) in text.split_inclusive(' ').enumerate() {
            if failure_after == Some(i) {
                events.push(Err(DomainError::backend("stream interrupted")));
                return Ok(stream::iter(events).boxed());
            }
            events.push(Ok(BackendStreamEvent::TextDelta(piece.to_string())));
        }

        if self.stalling {
            let guard = ReleaseGuard(self.released.clone());
            let stalled = stream::iter(events).chain(stream::pending()).map(move |event| {
                let _held = &guard;
                event
            });
            return Ok(stalled.boxed());
        }

        events.push(Ok(BackendStreamEvent::Ignored));
        events.push(Ok(BackendStreamEvent::Done));
        Ok(stream::iter(events).boxed())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendMessage, ReasoningEffort, RequestContext};
    use crate::application::{ModelCatalog, StrategySelector};

    fn request(model: &str, effort: Option<ReasoningEffort>) -> BackendRequest {
        let mut ctx = RequestContext::new("ping").with_model(model);
        if let Some(effort) = effort {
            ctx = ctx.with_reasoning_effort(effort);
        }
        let strategy = StrategySelector::default().select(&ModelCatalog::new("gpt-4o").resolve(ctx.model_id()), &ctx);
        BackendRequest::new(strategy, vec![BackendMessage::text(BackendRole::User, "ping")])
    }

    #[tokio::test]
    async fn test_echo_by_default() {
        let backend = MockBackend::new();
        let response = backend.complete(&request("gpt-4o", None)).await.unwrap();

        let BackendResponse::ChoiceList(completion) = response else {
            panic!("expected choice list");
        };
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("Echo: ping"));
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reasoning_call_returns_output_list() {
        let backend = MockBackend::new().with_reply("Answer").with_reasoning_summary("steps...");
        let response = backend
            .complete(&request("o3", Some(ReasoningEffort::High)))
            .await
            .unwrap();

        assert!(matches!(response, BackendResponse::OutputList(ref o) if o.output.len() == 2));
    }

    #[tokio::test]
    async fn test_stream_failure_after() {
        let backend = MockBackend::new().with_reply("one two three").with_stream_failure_after(1);
        let events: Vec<_> = backend
            .stream(&request("gpt-4o", None))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(events[1].is_err());
    }

    #[tokio::test]
    async fn test_stream_failure_for_one_flavor_only() {
        let backend = MockBackend::new()
            .with_reply("one two")
            .with_stream_failure_for(CallFlavor::ReasoningCapable, 0);

        let standard: Vec<_> = backend.stream(&request("gpt-4o", None)).await.unwrap().collect().await;
        assert!(standard.iter().all(|e| e.is_ok()));

        let reasoning: Vec<_> = backend
            .stream(&request("o3", Some(ReasoningEffort::High)))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(reasoning.len(), 1);
        assert!(reasoning[0].is_err());
    }

    #[tokio::test]
    async fn test_request_log_is_bounded() {
        let backend = MockBackend::new();
        for _ in 0..MAX_RECORDED_REQUESTS + 5 {
            backend.complete(&request("gpt-4o", None)).await.unwrap();
        }

        assert_eq!(backend.requests().len(), MAX_RECORDED_REQUESTS);
    }

    #[tokio::test]
    async fn test_dropping_stalled_stream_is_observed() {
        let backend = MockBackend::new().with_reply("one two").stalling();
        let mut events = backend.stream(&request("gpt-4o", None)).await.unwrap();

        assert!(matches!(events.next().await, Some(Ok(BackendStreamEvent::TextDelta(_)))));
        assert_eq!(backend.released_calls(), 0);

        drop(events);
        assert_eq!(backend.released_calls(), 1);
    }
}
