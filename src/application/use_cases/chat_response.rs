use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::{
    CompletionBackend, EventSink, FailureIsolation, GenerationSettings, HistoryFormatter,
    ModelCatalog, ResponseNormalizer, StrategySelector,
};
use crate::domain::{BackendMessage, RequestContext, ResponseResult, StreamEvent, Strategy};

/// A streamed reply: zero or more fragments, then exactly one `Final`.
pub type ChatEventStream = BoxStream<'static, StreamEvent>;

const STREAM_BUFFER: usize = 32;

/// Entry point for one chat turn: resolves the model, picks a strategy,
/// formats the history, calls the backend and normalizes the reply.
///
/// Never fails. Backend errors come back as ordinary reply text.
#[derive(Clone)]
pub struct ChatResponseUseCase {
    catalog: Arc<ModelCatalog>,
    selector: StrategySelector,
    normalizer: Arc<ResponseNormalizer>,
    isolation: FailureIsolation,
}

impl ChatResponseUseCase {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        backend: Arc<dyn CompletionBackend>,
        generation: GenerationSettings,
    ) -> Self {
        let selector = StrategySelector::new(generation);
        Self {
            catalog,
            normalizer: Arc::new(ResponseNormalizer::new(backend.clone(), selector.clone())),
            isolation: FailureIsolation::new(backend),
            selector,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub async fn get_response(&self, ctx: &RequestContext) -> ResponseResult {
        let (strategy, messages) = self.prepare(ctx, false);
        info!("Generating response ({})", strategy.summary());

        let outcome = self.normalizer.acquire(&strategy, &messages).await;
        self.isolation.absorb(outcome)
    }

    /// Start a streamed reply.
    ///
    /// The backend is driven by a spawned task feeding a bounded channel, so a
    /// slow consumer applies backpressure and dropping the stream cancels the
    /// backend read. Must be called from within a tokio runtime.
    pub fn stream_response(&self, ctx: &RequestContext) -> ChatEventStream {
        let (strategy, messages) = self.prepare(ctx, true);
        info!("Streaming response ({})", strategy.summary());

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let normalizer = self.normalizer.clone();
        let isolation = self.isolation.clone();

        tokio::spawn(async move {
            let mut sink = EventSink::new(tx);
            if let Err(e) = normalizer.acquire_stream(&strategy, messages, &mut sink).await {
                isolation.absorb_stream(&mut sink, &e).await;
            }
        });

        stream::unfold((rx, false), |(mut rx, finished)| async move {
            if finished {
                return None;
            }
            match rx.recv().await {
                Some(event) => {
                    let is_final = event.is_final();
                    Some((event, (rx, is_final)))
                }
                // Producer ended without closing the sequence.
                None => {
                    let result = ResponseResult::backend_error("the response stream ended unexpectedly");
                    Some((StreamEvent::final_from(result), (rx, true)))
                }
            }
        })
        .boxed()
    }

    fn prepare(&self, ctx: &RequestContext, streaming: bool) -> (Strategy, Vec<BackendMessage>) {
        let ctx = ctx.clone().with_streaming(streaming);
        let model = self.catalog.resolve(ctx.model_id());
        let strategy = self.selector.select(&model, &ctx);

        let mut messages = HistoryFormatter::format_request(&ctx, strategy.instruction_role);
        if !model.supports_vision() && messages.iter().any(BackendMessage::has_image) {
            warn!("Model {} does not accept images, sending text only", strategy.model);
            messages = HistoryFormatter::without_images(messages);
        }

        (strategy, messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::MockBackend;
    use std::time::Duration;

    use crate::domain::{CallFlavor, ConversationTurn, ReasoningEffort, StreamMode, BACKEND_ERROR_PREFIX};

    fn use_case(backend: MockBackend) -> (ChatResponseUseCase, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let use_case = ChatResponseUseCase::new(
            Arc::new(ModelCatalog::new("gpt-4o")),
            backend.clone(),
            GenerationSettings::default(),
        );
        (use_case, backend)
    }

    #[tokio::test]
    async fn test_get_response_plain() {
        let (use_case, backend) = use_case(MockBackend::new().with_reply("Hi there!"));

        let result = use_case.get_response(&RequestContext::new("Hello")).await;

        assert_eq!(result, ResponseResult::new("Hi there!", None));
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].strategy.flavor, CallFlavor::StandardCompletion);
        assert_eq!(requests[0].strategy.stream, StreamMode::Off);
    }

    #[tokio::test]
    async fn test_images_dropped_for_text_only_model() {
        let (use_case, backend) = use_case(MockBackend::new());
        let ctx = RequestContext::new("what is this?")
            .with_model("o3-mini")
            .with_image("iVBORw0KGgo")
            .with_history(vec![ConversationTurn::user_with_image("earlier", "/9j/abc")]);

        use_case.get_response(&ctx).await;

        let requests = backend.requests();
        assert!(requests[0].messages.iter().all(|m| !m.has_image()));
    }

    #[tokio::test]
    async fn test_reasoning_fallback_retries_once() {
        let (use_case, backend) = use_case(
            MockBackend::new()
                .with_reply("plain answer")
                .failing_for(CallFlavor::ReasoningCapable, "unsupported parameter"),
        );
        let ctx = RequestContext::new("Why?")
            .with_model("o3")
            .with_reasoning_effort(ReasoningEffort::High);

        let result = use_case.get_response(&ctx).await;

        assert_eq!(result.text(), "plain answer");
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].strategy.flavor, CallFlavor::ReasoningCapable);
        assert_eq!(requests[1].strategy.flavor, CallFlavor::StandardCompletion);
    }

    #[tokio::test]
    async fn test_stream_response_ends_with_single_final() {
        let (use_case, _) = use_case(MockBackend::new().with_reply("streamed reply text"));

        let events: Vec<StreamEvent> = use_case
            .stream_response(&RequestContext::new("Hello"))
            .collect()
            .await;

        let finals = events.iter().filter(|e| e.is_final()).count();
        assert_eq!(finals, 1);
        assert!(events.last().unwrap().is_final());

        let joined: String = events
            .iter()
            .filter(|e| !e.is_final())
            .map(|e| e.text())
            .collect();
        assert_eq!(joined, "streamed reply text");
        assert_eq!(events.last().unwrap().text(), joined);
    }

    async fn wait_for_release(backend: &MockBackend) -> usize {
        for _ in 0..100 {
            if backend.released_calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        backend.released_calls()
    }

    #[tokio::test]
    async fn test_failed_reasoning_stream_retries_as_standard() {
        let (use_case, backend) = use_case(
            MockBackend::new()
                .with_reply("plain streamed answer")
                .with_stream_failure_for(CallFlavor::ReasoningCapable, 0),
        );
        let ctx = RequestContext::new("Why?")
            .with_model("o3")
            .with_reasoning_effort(ReasoningEffort::High)
            .with_streaming(true);

        let events: Vec<StreamEvent> = use_case.stream_response(&ctx).collect().await;

        let flavors: Vec<CallFlavor> = backend.requests().iter().map(|r| r.strategy.flavor).collect();
        assert_eq!(flavors, vec![CallFlavor::ReasoningCapable, CallFlavor::StandardCompletion]);

        assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
        let joined: String = events.iter().filter(|e| !e.is_final()).map(|e| e.text()).collect();
        assert_eq!(joined, "plain streamed answer");
        assert_eq!(events.last().unwrap().text(), "plain streamed answer");
    }

    #[tokio::test]
    async fn test_stream_retry_failing_too_ends_with_error() {
        let (use_case, backend) = use_case(MockBackend::new().with_stream_failure_after(0));
        let ctx = RequestContext::new("Why?")
            .with_model("o3")
            .with_reasoning_effort(ReasoningEffort::High)
            .with_streaming(true);

        let events: Vec<StreamEvent> = use_case.stream_response(&ctx).collect().await;

        assert_eq!(backend.requests().len(), 2);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_final());
        assert!(events[0].text().starts_with(BACKEND_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn test_standard_stream_failure_is_not_retried() {
        let (use_case, backend) = use_case(MockBackend::new().with_stream_failure_after(0));
        let ctx = RequestContext::new("Hello").with_streaming(true);

        let events: Vec<StreamEvent> = use_case.stream_response(&ctx).collect().await;

        assert_eq!(backend.requests().len(), 1);
        assert!(events.last().unwrap().text().starts_with(BACKEND_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn test_disconnect_releases_native_stream() {
        let backend = Arc::new(MockBackend::new().with_reply("one two three").stalling());
        let use_case = ChatResponseUseCase::new(
            Arc::new(ModelCatalog::new("gpt-4o")),
            backend.clone(),
            GenerationSettings::default(),
        );

        let mut events = use_case.stream_response(&RequestContext::new("Hello").with_streaming(true));
        let first = events.next().await.unwrap();
        assert_eq!(first, StreamEvent::fragment("one "));
        assert_eq!(backend.released_calls(), 0);

        drop(events);
        assert_eq!(wait_for_release(&backend).await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_releases_emulated_call() {
        let backend = Arc::new(MockBackend::new().stalling());
        let use_case = ChatResponseUseCase::new(
            Arc::new(ModelCatalog::new("gpt-4o")),
            backend.clone(),
            GenerationSettings::default(),
        );
        let ctx = RequestContext::new("Hello").with_model("o1").with_streaming(true);

        let events = use_case.stream_response(&ctx);
        for _ in 0..100 {
            if !backend.requests().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(backend.requests()[0].strategy.stream, StreamMode::Emulated);
        assert_eq!(backend.released_calls(), 0);

        drop(events);
        assert_eq!(wait_for_release(&backend).await, 1);
    }
}
