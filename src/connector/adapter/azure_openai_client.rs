use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::{BackendEventStream, CompletionBackend};
use crate::domain::{
    BackendMessage, BackendRequest, BackendResponse, BackendStreamEvent, CallFlavor, ContentPart,
    DomainError, MessageContent, TokenLimitParam,
};

pub const DEFAULT_API_VERSION: &str = "2025-03-01-preview";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const REDACTED: &str = "[REDACTED]";

/// Connection settings for an Azure OpenAI resource.
///
/// Loaded once at startup. `Debug` output never includes the API key.
#[derive(Clone)]
pub struct BackendSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub default_deployment: String,
    pub timeout: Duration,
}

impl BackendSettings {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            default_deployment: DEFAULT_DEPLOYMENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Construct from environment variables:
    ///
    /// | Variable                       | Default              |
    /// |--------------------------------|----------------------|
    /// | `AZURE_OPENAI_ENDPOINT`        | required             |
    /// | `AZURE_OPENAI_API_KEY`         | required             |
    /// | `AZURE_OPENAI_API_VERSION`     | `2025-03-01-preview` |
    /// | `AZURE_OPENAI_DEPLOYMENT_NAME` | `gpt-4o`             |
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DomainError> {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let endpoint = read("AZURE_OPENAI_ENDPOINT");
        let api_key = read("AZURE_OPENAI_API_KEY");
        let (Some(endpoint), Some(api_key)) = (endpoint, api_key) else {
            return Err(DomainError::configuration(
                "Azure OpenAI API key or endpoint is missing (set AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_API_KEY)",
            ));
        };

        let mut settings = Self::new(endpoint, api_key);
        if let Some(version) = read("AZURE_OPENAI_API_VERSION") {
            settings.api_version = version;
        }
        if let Some(deployment) = read("AZURE_OPENAI_DEPLOYMENT_NAME") {
            settings.default_deployment = deployment;
        }
        Ok(settings)
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.endpoint.trim().is_empty() || self.api_key.trim().is_empty() {
            return Err(DomainError::configuration("Azure OpenAI API key or endpoint is missing"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(DomainError::configuration(format!(
                "Azure OpenAI endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &REDACTED)
            .field("api_version", &self.api_version)
            .field("default_deployment", &self.default_deployment)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire types: Chat Completions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: ChatContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatContent<'a> {
    Text(&'a str),
    Parts(Vec<ChatPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types: Responses
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<ResponsesInput<'a>>,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ResponsesInput<'a> {
    role: &'static str,
    content: ResponsesContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResponsesContent<'a> {
    Text(&'a str),
    Parts(Vec<ResponsesPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponsesPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str },
}

#[derive(Serialize)]
struct ReasoningParams {
    effort: &'static str,
    summary: &'static str,
}

#[derive(Deserialize)]
struct ResponsesStreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<FailedResponse>,
}

#[derive(Deserialize)]
struct FailedResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ApiErrorBody {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// HTTP client for Azure OpenAI.
///
/// Standard completions go to the deployment's Chat Completions endpoint;
/// reasoning-capable calls go to the Responses endpoint with a reasoning
/// effort and `summary: "auto"`. Streams are read as server-sent events.
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    settings: BackendSettings,
    base_url: Url,
}

impl AzureOpenAiClient {
    pub fn new(settings: BackendSettings) -> Result<Self, DomainError> {
        settings.validate()?;

        // No overall timeout on the client: streams may legitimately run longer
        // than one-shot calls. One-shot requests set their own.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(settings.endpoint.trim()).map_err(|e| {
            DomainError::configuration(format!("Invalid Azure OpenAI endpoint {}: {e}", settings.endpoint))
        })?;
        Ok(Self {
            client,
            settings,
            base_url,
        })
    }

    pub fn from_env() -> Result<Self, DomainError> {
        Self::new(BackendSettings::from_env()?)
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// The deployment id is caller-controlled; it is pushed as one
    /// percent-encoded path segment so it can never leave the deployment path.
    fn chat_url(&self, deployment: &str) -> Result<Url, DomainError> {
        let deployment = deployment.trim();
        if deployment.is_empty() || deployment == "." || deployment == ".." {
            return Err(DomainError::invalid_input(format!(
                "Invalid deployment name: '{}'",
                deployment
            )));
        }
        self.endpoint_url(&["openai", "deployments", deployment, "chat", "completions"])
    }

    fn responses_url(&self) -> Result<Url, DomainError> {
        self.endpoint_url(&["openai", "responses"])
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| DomainError::configuration(format!("Endpoint cannot be a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.settings.api_version);
        Ok(url)
    }

    async fn send(&self, request: &BackendRequest, stream: bool) -> Result<reqwest::Response, DomainError> {
        let strategy = &request.strategy;
        let builder = match strategy.flavor {
            CallFlavor::StandardCompletion => self
                .client
                .post(self.chat_url(&strategy.model)?)
                .json(&chat_body(request, stream)),
            CallFlavor::ReasoningCapable => self
                .client
                .post(self.responses_url()?)
                .json(&responses_body(request, stream)),
        };
        let builder = builder.header("api-key", &self.settings.api_key);
        let builder = if stream {
            builder.header(reqwest::header::ACCEPT, "text/event-stream")
        } else {
            builder.timeout(self.settings.timeout)
        };

        debug!(
            "AzureOpenAiClient: POST {} ({}, {} messages, stream={})",
            strategy.model,
            strategy.flavor,
            request.messages.len(),
            stream
        );

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::backend(format!("request timed out after {}s", self.settings.timeout.as_secs()))
            } else {
                DomainError::backend(format!("request failed: {}", e.without_url()))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|envelope| envelope.error.describe())
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("no response body").to_string()
                } else {
                    trimmed.to_string()
                }
            });
        warn!("AzureOpenAiClient: API returned {}: {}", status, self.sanitize(&detail));
        Err(DomainError::backend(format!("Error code: {} - {}", status.as_u16(), detail)))
    }
}

#[async_trait]
impl CompletionBackend for AzureOpenAiClient {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, DomainError> {
        let response = self.send(request, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| DomainError::backend(format!("failed to read response: {}", e.without_url())))?;

        serde_json::from_str(&body)
            .map_err(|e| DomainError::malformed_response(format!("unexpected response shape: {e}")))
    }

    async fn stream(&self, request: &BackendRequest) -> Result<BackendEventStream, DomainError> {
        let response = self.send(request, true).await?;
        let flavor = request.strategy.flavor;

        let events = response.bytes_stream().eventsource().map(move |event| match event {
            Ok(event) => match flavor {
                CallFlavor::StandardCompletion => parse_chat_chunk(&event.data),
                CallFlavor::ReasoningCapable => parse_responses_event(&event.data),
            },
            Err(e) => Err(DomainError::backend(format!("stream interrupted: {e}"))),
        });
        Ok(events.boxed())
    }

    fn name(&self) -> &str {
        "azure-openai"
    }

    fn sanitize(&self, diagnostic: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            diagnostic.to_string()
        } else {
            diagnostic.replace(key, REDACTED)
        }
    }
}

fn chat_body(request: &BackendRequest, stream: bool) -> ChatCompletionRequest<'_> {
    let strategy = &request.strategy;
    let limit = Some(strategy.max_output_tokens);
    let (max_tokens, max_completion_tokens) = match strategy.token_limit_param {
        TokenLimitParam::MaxTokens => (limit, None),
        TokenLimitParam::MaxCompletionTokens | TokenLimitParam::MaxOutputTokens => (None, limit),
    };
    let sampling = strategy.sampling;

    ChatCompletionRequest {
        messages: request.messages.iter().map(chat_message).collect(),
        max_tokens,
        max_completion_tokens,
        temperature: sampling.map(|s| s.temperature),
        top_p: sampling.map(|s| s.top_p),
        frequency_penalty: sampling.map(|s| s.frequency_penalty),
        presence_penalty: sampling.map(|s| s.presence_penalty),
        stream,
    }
}

fn chat_message(message: &BackendMessage) -> ChatMessage<'_> {
    let content = match &message.content {
        MessageContent::Text(text) => ChatContent::Text(text),
        MessageContent::Parts(parts) => ChatContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => ChatPart::Text { text },
                    ContentPart::ImageUrl(url) => ChatPart::ImageUrl {
                        image_url: ImageUrl { url },
                    },
                })
                .collect(),
        ),
    };
    ChatMessage {
        role: message.role.as_str(),
        content,
    }
}

fn responses_body(request: &BackendRequest, stream: bool) -> ResponsesRequest<'_> {
    let strategy = &request.strategy;
    ResponsesRequest {
        model: &strategy.model,
        input: request.messages.iter().map(responses_input).collect(),
        max_output_tokens: strategy.max_output_tokens,
        reasoning: strategy.reasoning_effort.map(|effort| ReasoningParams {
            effort: effort.as_str(),
            summary: "auto",
        }),
        temperature: strategy.sampling.map(|s| s.temperature),
        top_p: strategy.sampling.map(|s| s.top_p),
        stream,
    }
}

fn responses_input(message: &BackendMessage) -> ResponsesInput<'_> {
    let content = match &message.content {
        MessageContent::Text(text) => ResponsesContent::Text(text),
        MessageContent::Parts(parts) => ResponsesContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => ResponsesPart::InputText { text },
                    ContentPart::ImageUrl(url) => ResponsesPart::InputImage { image_url: url },
                })
                .collect(),
        ),
    };
    ResponsesInput {
        role: message.role.as_str(),
        content,
    }
}

fn parse_chat_chunk(data: &str) -> Result<BackendStreamEvent, DomainError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(BackendStreamEvent::Done);
    }
    if data.is_empty() {
        return Ok(BackendStreamEvent::Ignored);
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| DomainError::malformed_response(format!("unreadable stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(DomainError::backend(error.describe()));
    }

    // Azure sends a leading chunk with empty choices carrying filter results.
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(BackendStreamEvent::TextDelta)
        .unwrap_or(BackendStreamEvent::Ignored))
}

fn parse_responses_event(data: &str) -> Result<BackendStreamEvent, DomainError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(BackendStreamEvent::Done);
    }
    if data.is_empty() {
        return Ok(BackendStreamEvent::Ignored);
    }

    let event: ResponsesStreamEvent = serde_json::from_str(data)
        .map_err(|e| DomainError::malformed_response(format!("unreadable stream event: {e}")))?;

    let event = match event.kind.as_str() {
        "response.output_text.delta" => event
            .delta
            .map(BackendStreamEvent::TextDelta)
            .unwrap_or(BackendStreamEvent::Ignored),
        "response.reasoning_summary_text.delta" => event
            .delta
            .map(BackendStreamEvent::ReasoningSummaryDelta)
            .unwrap_or(BackendStreamEvent::Ignored),
        "response.reasoning_summary_text.done" => {
            BackendStreamEvent::ReasoningSummary(event.text.unwrap_or_default())
        }
        "response.reasoning_summary" => {
            BackendStreamEvent::ReasoningSummary(event.value.or(event.text).unwrap_or_default())
        }
        "response.completed" => BackendStreamEvent::Done,
        "response.incomplete" => {
            warn!("AzureOpenAiClient: response ended incomplete");
            BackendStreamEvent::Done
        }
        "error" => {
            return Err(DomainError::backend(
                event.message.unwrap_or_else(|| "stream reported an error".to_string()),
            ))
        }
        "response.failed" => {
            let detail = event
                .response
                .and_then(|r| r.error)
                .map(|e| e.describe())
                .unwrap_or_else(|| "response failed".to_string());
            return Err(DomainError::backend(detail));
        }
        _ => BackendStreamEvent::Ignored,
    };
    Ok(event)
}
