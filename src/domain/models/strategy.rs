use serde::{Deserialize, Serialize};

use super::{ParameterDialect, ReasoningEffort};

/// Which backend operation serves the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFlavor {
    /// Choice-list completion call.
    StandardCompletion,
    /// Structured-output call that accepts a reasoning effort and can return
    /// a reasoning summary.
    ReasoningCapable,
}

impl CallFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallFlavor::StandardCompletion => "standard_completion",
            CallFlavor::ReasoningCapable => "reasoning_capable",
        }
    }
}

impl std::fmt::Display for CallFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One-shot call, no stream requested.
    Off,
    /// The backend streams deltas itself.
    Native,
    /// One-shot call re-chunked into fragments locally.
    Emulated,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Off => "off",
            StreamMode::Native => "native",
            StreamMode::Emulated => "emulated",
        }
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name of the output-length parameter for the chosen call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenLimitParam {
    MaxTokens,
    MaxCompletionTokens,
    MaxOutputTokens,
}

impl TokenLimitParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenLimitParam::MaxTokens => "max_tokens",
            TokenLimitParam::MaxCompletionTokens => "max_completion_tokens",
            TokenLimitParam::MaxOutputTokens => "max_output_tokens",
        }
    }
}

/// Role under which instruction text is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionRole {
    Developer,
    System,
}

impl InstructionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionRole::Developer => "developer",
            InstructionRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// The calling plan for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub model: String,
    pub flavor: CallFlavor,
    pub dialect: ParameterDialect,
    pub token_limit_param: TokenLimitParam,
    pub max_output_tokens: u32,
    pub sampling: Option<SamplingParams>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub stream: StreamMode,
    pub instruction_role: InstructionRole,
}

impl Strategy {
    pub fn is_reasoning_capable(&self) -> bool {
        self.flavor == CallFlavor::ReasoningCapable
    }

    pub fn streams_natively(&self) -> bool {
        self.stream == StreamMode::Native
    }

    pub fn summary(&self) -> String {
        format!(
            "model={}, flavor={}, dialect={}, {}={}, sampling={}, stream={}",
            self.model,
            self.flavor,
            self.dialect,
            self.token_limit_param.as_str(),
            self.max_output_tokens,
            self.sampling.is_some(),
            self.stream,
        )
    }
}
