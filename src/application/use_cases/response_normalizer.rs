use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::{CompletionBackend, HistoryFormatter, StrategySelector, EMULATED_CHUNK_SIZE};
use crate::domain::{
    BackendMessage, BackendRequest, BackendResponse, BackendStreamEvent, ChatCompletion,
    DomainError, OutputContent, OutputItem, ResponseOutput, ResponseResult, StreamEvent, Strategy,
    FALLBACK_RESPONSE,
};

/// Collects a reasoning summary from whichever form the backend uses: summary
/// parts of a reasoning output item, a legacy top-level field, streamed
/// deltas, or one marked chunk in the middle of a stream.
#[derive(Debug, Default)]
pub struct ReasoningSummaryCollector {
    parts: Vec<String>,
    pending: String,
}

impl ReasoningSummaryCollector {
    pub fn push_delta(&mut self, delta: &str) {
        self.pending.push_str(delta);
    }

    /// Close the current part. A non-empty `full_text` replaces whatever
    /// deltas were buffered for it.
    pub fn complete_part(&mut self, full_text: &str) {
        let part = if full_text.trim().is_empty() {
            std::mem::take(&mut self.pending)
        } else {
            self.pending.clear();
            full_text.to_string()
        };
        if !part.trim().is_empty() {
            self.parts.push(part);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.pending.trim().is_empty()
    }

    pub fn into_summary(mut self) -> Option<String> {
        if !self.pending.trim().is_empty() {
            let pending = std::mem::take(&mut self.pending);
            self.parts.push(pending);
        }
        (!self.parts.is_empty()).then(|| self.parts.join("\n\n"))
    }
}

/// Write side of a streamed reply.
///
/// Wraps the bounded channel the transport layer reads from and keeps the
/// concatenation of every fragment sent, so the `Final` event can carry it.
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    accumulated: String,
    finished: bool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            accumulated: String::new(),
            finished: false,
        }
    }

    /// Send a fragment. Empty text is skipped. Returns `false` once the
    /// consumer has gone away.
    pub async fn fragment(&mut self, text: &str) -> bool {
        if self.finished {
            return false;
        }
        if text.is_empty() {
            return !self.tx.is_closed();
        }
        self.accumulated.push_str(text);
        self.tx.send(StreamEvent::fragment(text)).await.is_ok()
    }

    /// Close the sequence with the accumulated text.
    pub async fn finish(&mut self, reasoning_summary: Option<String>) -> bool {
        let result = ResponseResult::new(self.accumulated.clone(), reasoning_summary);
        self.finish_with(result).await
    }

    /// Close the sequence with an explicit result.
    pub async fn finish_with(&mut self, result: ResponseResult) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.tx.send(StreamEvent::final_from(result)).await.is_ok()
    }

    pub fn has_emitted(&self) -> bool {
        !self.accumulated.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the consumer drops its end of the channel.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Split text into chunks of `size` characters, left to right.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

/// Executes a strategy against the backend and reshapes whatever comes back
/// into [`ResponseResult`] or a sequence of [`StreamEvent`]s.
pub struct ResponseNormalizer {
    backend: Arc<dyn CompletionBackend>,
    selector: StrategySelector,
}

impl ResponseNormalizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, selector: StrategySelector) -> Self {
        Self { backend, selector }
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    /// One backend call, plus one standard-completion retry when a
    /// reasoning-capable call fails.
    pub async fn acquire(
        &self,
        strategy: &Strategy,
        messages: &[BackendMessage],
    ) -> Result<ResponseResult, DomainError> {
        match self.complete_once(strategy, messages.to_vec()).await {
            Ok(result) => Ok(result),
            Err(e) => match self.selector.fallback(strategy) {
                Some(fallback) => {
                    warn!(
                        "Reasoning-capable call to {} failed: {}. Retrying as standard completion.",
                        strategy.model, e
                    );
                    let messages =
                        HistoryFormatter::with_instruction_role(messages.to_vec(), fallback.instruction_role);
                    self.complete_once(&fallback, messages).await
                }
                None => Err(e),
            },
        }
    }

    async fn complete_once(
        &self,
        strategy: &Strategy,
        messages: Vec<BackendMessage>,
    ) -> Result<ResponseResult, DomainError> {
        debug!(
            "Calling {} ({}) with {} messages",
            self.backend.name(),
            strategy.summary(),
            messages.len()
        );
        let request = BackendRequest::new(strategy.clone(), messages);
        let response = self.backend.complete(&request).await?;
        Ok(Self::extract(strategy, response))
    }

    /// Pull the assistant text and, for reasoning-capable calls, the reasoning
    /// summary out of a backend reply.
    pub fn extract(strategy: &Strategy, response: BackendResponse) -> ResponseResult {
        let (text, summary) = match response {
            BackendResponse::ChoiceList(completion) => (assistant_text_from_choices(&completion), None),
            BackendResponse::OutputList(output) => (
                assistant_text_from_output(&output),
                reasoning_summary_from_output(&output),
            ),
        };
        let summary = summary.filter(|_| strategy.is_reasoning_capable());

        match text {
            Some(text) if !text.trim().is_empty() => ResponseResult::new(text, summary),
            _ => {
                warn!("No assistant text in response from {}", strategy.model);
                ResponseResult::new(FALLBACK_RESPONSE, summary)
            }
        }
    }

    /// Stream a reply into `sink`, natively or by chunking a one-shot reply.
    ///
    /// Returns early without error when the consumer disconnects; the backend
    /// stream is dropped on every exit path.
    pub async fn acquire_stream(
        &self,
        strategy: &Strategy,
        messages: Vec<BackendMessage>,
        sink: &mut EventSink,
    ) -> Result<(), DomainError> {
        if strategy.streams_natively() {
            self.stream_native(strategy, messages, sink).await
        } else {
            self.stream_emulated(strategy, messages, sink).await
        }
    }

    async fn stream_emulated(
        &self,
        strategy: &Strategy,
        messages: Vec<BackendMessage>,
        sink: &mut EventSink,
    ) -> Result<(), DomainError> {
        debug!("Emulating stream for {} in {}-character chunks", strategy.model, EMULATED_CHUNK_SIZE);
        let result = tokio::select! {
            _ = sink.closed() => {
                debug!("Stream consumer disconnected before the reply arrived");
                return Ok(());
            }
            result = self.acquire(strategy, &messages) => result?,
        };

        for chunk in chunk_text(result.text(), EMULATED_CHUNK_SIZE) {
            if !sink.fragment(&chunk).await {
                debug!("Stream consumer disconnected during emulated stream");
                return Ok(());
            }
        }
        let (_, summary) = result.into_parts();
        sink.finish(summary).await;
        Ok(())
    }

    /// Native streaming with one standard-completion retry when a
    /// reasoning-capable stream fails before its first fragment.
    async fn stream_native(
        &self,
        strategy: &Strategy,
        messages: Vec<BackendMessage>,
        sink: &mut EventSink,
    ) -> Result<(), DomainError> {
        let retry = self
            .selector
            .fallback(strategy)
            .map(|fallback| (fallback, messages.clone()));

        match self.relay(strategy, messages, sink).await {
            Err(e) if !sink.has_emitted() && !sink.is_finished() => match retry {
                Some((fallback, messages)) => {
                    warn!(
                        "Reasoning-capable stream to {} failed: {}. Retrying as standard completion.",
                        strategy.model, e
                    );
                    let messages = HistoryFormatter::with_instruction_role(messages, fallback.instruction_role);
                    self.relay(&fallback, messages, sink).await
                }
                None => Err(e),
            },
            outcome => outcome,
        }
    }

    async fn relay(
        &self,
        strategy: &Strategy,
        messages: Vec<BackendMessage>,
        sink: &mut EventSink,
    ) -> Result<(), DomainError> {
        let request = BackendRequest::new(strategy.clone(), messages);
        debug!(
            "Opening stream on {} ({}) with {} messages",
            self.backend.name(),
            strategy.summary(),
            request.messages.len()
        );
        let mut upstream = self.backend.stream(&request).await?;

        let mut summary = ReasoningSummaryCollector::default();
        loop {
            let next = tokio::select! {
                _ = sink.closed() => {
                    debug!("Stream consumer disconnected, releasing backend stream");
                    return Ok(());
                }
                next = upstream.next() => next,
            };

            match next {
                None | Some(Ok(BackendStreamEvent::Done)) => break,
                Some(Ok(BackendStreamEvent::TextDelta(delta))) => {
                    if !sink.fragment(&delta).await {
                        debug!("Stream consumer disconnected, releasing backend stream");
                        return Ok(());
                    }
                }
                Some(Ok(BackendStreamEvent::ReasoningSummaryDelta(delta))) => summary.push_delta(&delta),
                Some(Ok(BackendStreamEvent::ReasoningSummary(full))) => summary.complete_part(&full),
                Some(Ok(BackendStreamEvent::Ignored)) => {}
                Some(Err(e)) => return Err(e),
            }
        }
        drop(upstream);

        if !sink.has_emitted() {
            warn!("Stream from {} produced no text", strategy.model);
            sink.fragment(FALLBACK_RESPONSE).await;
        }
        sink.finish(summary.into_summary()).await;
        Ok(())
    }
}

fn assistant_text_from_choices(completion: &ChatCompletion) -> Option<String> {
    completion
        .choices
        .iter()
        .filter(|choice| choice.message.role == "assistant")
        .find_map(|choice| {
            choice
                .message
                .content
                .clone()
                .filter(|text| !text.trim().is_empty())
                .or_else(|| choice.message.refusal.clone())
        })
}

fn assistant_text_from_output(output: &ResponseOutput) -> Option<String> {
    let texts: Vec<&str> = output
        .output
        .iter()
        .filter_map(|item| match item {
            OutputItem::Message { role, content } if role == "assistant" => Some(content),
            _ => None,
        })
        .flatten()
        .filter_map(|content| match content {
            OutputContent::OutputText { text } => Some(text.as_str()),
            OutputContent::Refusal { refusal } => Some(refusal.as_str()),
            OutputContent::Other => None,
        })
        .collect();

    (!texts.is_empty()).then(|| texts.concat())
}

fn reasoning_summary_from_output(output: &ResponseOutput) -> Option<String> {
    let mut collector = ReasoningSummaryCollector::default();
    for item in &output.output {
        if let OutputItem::Reasoning { summary } = item {
            for part in summary {
                collector.complete_part(&part.text);
            }
        }
    }
    if collector.is_empty() {
        if let Some(legacy) = output.reasoning_summary.as_deref() {
            collector.complete_part(legacy);
        }
    }
    collector.into_summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ModelCatalog, StrategySelector};
    use crate::domain::{Choice, ChoiceMessage, ReasoningEffort, RequestContext, SummaryPart};

    fn strategy_for(model: &str, effort: Option<ReasoningEffort>) -> Strategy {
        let catalog = ModelCatalog::new("gpt-4o");
        let mut ctx = RequestContext::new("hi").with_model(model);
        if let Some(effort) = effort {
            ctx = ctx.with_reasoning_effort(effort);
        }
        StrategySelector::default().select(&catalog.resolve(ctx.model_id()), &ctx)
    }

    fn choice(role: &str, content: Option<&str>) -> Choice {
        Choice {
            index: 0,
            message: ChoiceMessage {
                role: role.to_string(),
                content: content.map(String::from),
                refusal: None,
            },
            finish_reason: Some("stop".to_string()),
        }
    }

    #[test]
    fn test_extract_choice_list() {
        let response = BackendResponse::ChoiceList(ChatCompletion {
            choices: vec![choice("assistant", Some("Hi there!"))],
            ..Default::default()
        });
        let result = ResponseNormalizer::extract(&strategy_for("gpt-4o", None), response);

        assert_eq!(result, ResponseResult::new("Hi there!", None));
    }

    #[test]
    fn test_extract_skips_non_assistant_choices() {
        let response = BackendResponse::ChoiceList(ChatCompletion {
            choices: vec![choice("tool", Some("raw")), choice("assistant", Some("real"))],
            ..Default::default()
        });
        let result = ResponseNormalizer::extract(&strategy_for("gpt-4o", None), response);

        assert_eq!(result.text(), "real");
    }

    #[test]
    fn test_extract_empty_text_uses_fallback() {
        let empty = BackendResponse::ChoiceList(ChatCompletion {
            choices: vec![choice("assistant", Some("   "))],
            ..Default::default()
        });
        let none = BackendResponse::ChoiceList(ChatCompletion::default());

        let strategy = strategy_for("gpt-4o", None);
        assert_eq!(ResponseNormalizer::extract(&strategy, empty).text(), FALLBACK_RESPONSE);
        assert_eq!(ResponseNormalizer::extract(&strategy, none).text(), FALLBACK_RESPONSE);
    }

    #[test]
    fn test_extract_output_list_with_summary() {
        let response = BackendResponse::OutputList(ResponseOutput {
            output: vec![
                OutputItem::Reasoning {
                    summary: vec![SummaryPart {
                        text: "steps...".to_string(),
                    }],
                },
                OutputItem::Message {
                    role: "assistant".to_string(),
                    content: vec![OutputContent::OutputText {
                        text: "Answer".to_string(),
                    }],
                },
            ],
            ..Default::default()
        });
        let strategy = strategy_for("o3", Some(ReasoningEffort::High));
        let result = ResponseNormalizer::extract(&strategy, response);

        assert_eq!(result, ResponseResult::new("Answer", Some("steps...".to_string())));
    }

    #[test]
    fn test_extract_legacy_top_level_summary() {
        let response = BackendResponse::OutputList(ResponseOutput {
            output: vec![OutputItem::Message {
                role: "assistant".to_string(),
                content: vec![OutputContent::OutputText {
                    text: "Answer".to_string(),
                }],
            }],
            reasoning_summary: Some("legacy steps".to_string()),
            ..Default::default()
        });
        let strategy = strategy_for("o3", Some(ReasoningEffort::Low));
        let result = ResponseNormalizer::extract(&strategy, response);

        assert_eq!(result.reasoning_summary(), Some("legacy steps"));
    }

    #[test]
    fn test_summary_dropped_for_standard_calls() {
        let response = BackendResponse::OutputList(ResponseOutput {
            output: vec![OutputItem::Message {
                role: "assistant".to_string(),
                content: vec![OutputContent::OutputText {
                    text: "Answer".to_string(),
                }],
            }],
            reasoning_summary: Some("steps".to_string()),
            ..Default::default()
        });
        let result = ResponseNormalizer::extract(&strategy_for("o3", None), response);

        assert_eq!(result.reasoning_summary(), None);
    }

    #[test]
    fn test_chunk_text() {
        assert_eq!(chunk_text("ABCDEFGHIJK", 10), vec!["ABCDEFGHIJ", "K"]);
        assert!(chunk_text("", 10).is_empty());
        assert_eq!(chunk_text("héllo wörld", 5), vec!["héllo", " wörl", "d"]);
    }

    #[test]
    fn test_summary_collector_prefers_completed_text() {
        let mut collector = ReasoningSummaryCollector::default();
        collector.push_delta("par");
        collector.push_delta("tial");
        collector.complete_part("complete");
        collector.push_delta("second");

        assert_eq!(collector.into_summary().as_deref(), Some("complete\n\nsecond"));
    }

    #[test]
    fn test_summary_collector_empty() {
        let mut collector = ReasoningSummaryCollector::default();
        collector.complete_part("  ");
        assert!(collector.is_empty());
        assert_eq!(collector.into_summary(), None);
    }

    #[tokio::test]
    async fn test_event_sink_tracks_fragments() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = EventSink::new(tx);

        assert!(sink.fragment("Hel").await);
        assert!(sink.fragment("").await);
        assert!(sink.fragment("lo").await);
        assert!(sink.finish(None).await);
        assert!(!sink.finish(None).await);

        assert_eq!(rx.recv().await, Some(StreamEvent::fragment("Hel")));
        assert_eq!(rx.recv().await, Some(StreamEvent::fragment("lo")));
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Final {
                full_text: "Hello".to_string(),
                reasoning_summary: None,
            })
        );
    }

    #[tokio::test]
    async fn test_event_sink_reports_disconnect() {
        let (tx, rx) = mpsc::channel(8);
        let mut sink = EventSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        assert!(!sink.fragment("lost").await);
    }
}
