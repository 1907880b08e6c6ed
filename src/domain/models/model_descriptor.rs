use serde::{Deserialize, Serialize};

/// Request-parameter family a backend model understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDialect {
    /// Classic chat models: `max_tokens` plus sampling parameters.
    #[default]
    Standard,
    /// `o`-series models: `max_completion_tokens`, no sampling parameters.
    ReasoningSeries,
}

impl ParameterDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterDialect::Standard => "standard",
            ParameterDialect::ReasoningSeries => "reasoning_series",
        }
    }

    pub fn supports_sampling(&self) -> bool {
        matches!(self, ParameterDialect::Standard)
    }
}

impl std::fmt::Display for ParameterDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub streaming: bool,
    pub reasoning_summary: bool,
    pub dialect: ParameterDialect,
}

impl ModelCapabilities {
    pub const fn new(
        vision: bool,
        streaming: bool,
        reasoning_summary: bool,
        dialect: ParameterDialect,
    ) -> Self {
        Self {
            vision,
            streaming,
            reasoning_summary,
            dialect,
        }
    }
}

/// A backend model together with what it is able to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    id: String,
    display_name: String,
    description: String,
    capabilities: ModelCapabilities,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            capabilities,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    pub fn supports_vision(&self) -> bool {
        self.capabilities.vision
    }

    pub fn supports_streaming(&self) -> bool {
        self.capabilities.streaming
    }

    pub fn supports_reasoning_summary(&self) -> bool {
        self.capabilities.reasoning_summary
    }

    pub fn parameter_dialect(&self) -> ParameterDialect {
        self.capabilities.dialect
    }
}
