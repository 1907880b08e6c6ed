use serde::{Deserialize, Serialize};

use crate::domain::{
    CallFlavor, InstructionRole, ModelDescriptor, ParameterDialect, RequestContext,
    SamplingParams, Strategy, StreamMode, TokenLimitParam,
};

/// Characters per fragment when streaming is emulated.
pub const EMULATED_CHUNK_SIZE: usize = 10;

/// Output length and sampling defaults applied to every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 4096,
            temperature: 0.7,
            top_p: 0.95,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl GenerationSettings {
    fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }
}

/// Picks the backend call shape for a request. Pure decision logic.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    generation: GenerationSettings,
}

impl StrategySelector {
    pub fn new(generation: GenerationSettings) -> Self {
        Self { generation }
    }

    pub fn select(&self, model: &ModelDescriptor, ctx: &RequestContext) -> Strategy {
        let flavor = if model.supports_reasoning_summary() && ctx.reasoning_effort().is_some() {
            CallFlavor::ReasoningCapable
        } else {
            CallFlavor::StandardCompletion
        };

        let stream = match (ctx.wants_streaming(), model.supports_streaming()) {
            (false, _) => StreamMode::Off,
            (true, true) => StreamMode::Native,
            (true, false) => StreamMode::Emulated,
        };

        // Unrecognized ids resolve to the default descriptor but are still sent
        // to the backend under the name the caller used.
        let deployment = ctx.model_id().unwrap_or(model.id()).to_string();

        self.build(deployment, flavor, model.parameter_dialect(), ctx, stream)
    }

    /// The standard-completion strategy to retry with after a reasoning-capable
    /// call failed. `None` when the strategy already is the standard shape.
    pub fn fallback(&self, strategy: &Strategy) -> Option<Strategy> {
        if strategy.flavor != CallFlavor::ReasoningCapable {
            return None;
        }

        let dialect = strategy.dialect;
        Some(Strategy {
            flavor: CallFlavor::StandardCompletion,
            token_limit_param: token_limit_param(CallFlavor::StandardCompletion, dialect),
            reasoning_effort: None,
            instruction_role: instruction_role(CallFlavor::StandardCompletion, dialect),
            ..strategy.clone()
        })
    }

    fn build(
        &self,
        model: String,
        flavor: CallFlavor,
        dialect: ParameterDialect,
        ctx: &RequestContext,
        stream: StreamMode,
    ) -> Strategy {
        Strategy {
            model,
            flavor,
            dialect,
            token_limit_param: token_limit_param(flavor, dialect),
            max_output_tokens: self.generation.max_output_tokens,
            sampling: dialect.supports_sampling().then(|| self.generation.sampling()),
            reasoning_effort: match flavor {
                CallFlavor::ReasoningCapable => ctx.reasoning_effort(),
                CallFlavor::StandardCompletion => None,
            },
            stream,
            instruction_role: instruction_role(flavor, dialect),
        }
    }
}

fn token_limit_param(flavor: CallFlavor, dialect: ParameterDialect) -> TokenLimitParam {
    match (flavor, dialect) {
        (CallFlavor::ReasoningCapable, _) => TokenLimitParam::MaxOutputTokens,
        (CallFlavor::StandardCompletion, ParameterDialect::Standard) => TokenLimitParam::MaxTokens,
        (CallFlavor::StandardCompletion, ParameterDialect::ReasoningSeries) => {
            TokenLimitParam::MaxCompletionTokens
        }
    }
}

fn instruction_role(flavor: CallFlavor, dialect: ParameterDialect) -> InstructionRole {
    match (flavor, dialect) {
        (CallFlavor::StandardCompletion, ParameterDialect::Standard) => InstructionRole::System,
        _ => InstructionRole::Developer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ModelCatalog;
    use crate::domain::ReasoningEffort;

    fn select(model: Option<&str>, ctx: RequestContext) -> Strategy {
        let catalog = ModelCatalog::new("gpt-4o");
        let ctx = match model {
            Some(id) => ctx.with_model(id),
            None => ctx,
        };
        StrategySelector::default().select(&catalog.resolve(ctx.model_id()), &ctx)
    }

    #[test]
    fn test_default_model_uses_standard_completion() {
        let strategy = select(None, RequestContext::new("Hello"));

        assert_eq!(strategy.model, "gpt-4o");
        assert_eq!(strategy.flavor, CallFlavor::StandardCompletion);
        assert_eq!(strategy.dialect, ParameterDialect::Standard);
        assert_eq!(strategy.token_limit_param, TokenLimitParam::MaxTokens);
        assert!(strategy.sampling.is_some());
        assert_eq!(strategy.stream, StreamMode::Off);
        assert_eq!(strategy.instruction_role, InstructionRole::System);
    }

    #[test]
    fn test_reasoning_capable_needs_effort_and_support() {
        let with_effort = select(
            Some("o3"),
            RequestContext::new("Why?").with_reasoning_effort(ReasoningEffort::High),
        );
        assert_eq!(with_effort.flavor, CallFlavor::ReasoningCapable);
        assert_eq!(with_effort.token_limit_param, TokenLimitParam::MaxOutputTokens);
        assert_eq!(with_effort.reasoning_effort, Some(ReasoningEffort::High));
        assert!(with_effort.sampling.is_none());

        let without_effort = select(Some("o3"), RequestContext::new("Why?"));
        assert_eq!(without_effort.flavor, CallFlavor::StandardCompletion);
        assert_eq!(without_effort.token_limit_param, TokenLimitParam::MaxCompletionTokens);
        assert_eq!(without_effort.instruction_role, InstructionRole::Developer);
    }

    #[test]
    fn test_effort_ignored_without_summary_support() {
        for model in ["gpt-4o", "o1"] {
            let strategy = select(
                Some(model),
                RequestContext::new("Why?").with_reasoning_effort(ReasoningEffort::Low),
            );
            assert_eq!(strategy.flavor, CallFlavor::StandardCompletion, "model={model}");
            assert_eq!(strategy.reasoning_effort, None);
        }
    }

    #[test]
    fn test_stream_mode_follows_capability() {
        let native = select(Some("gpt-4o"), RequestContext::new("hi").with_streaming(true));
        assert_eq!(native.stream, StreamMode::Native);

        let emulated = select(Some("o1"), RequestContext::new("hi").with_streaming(true));
        assert_eq!(emulated.stream, StreamMode::Emulated);

        let off = select(Some("o1"), RequestContext::new("hi"));
        assert_eq!(off.stream, StreamMode::Off);
    }

    #[test]
    fn test_unknown_model_passes_through() {
        let strategy = select(Some("my-custom-deployment"), RequestContext::new("hi"));
        assert_eq!(strategy.model, "my-custom-deployment");
        assert_eq!(strategy.dialect, ParameterDialect::Standard);
    }

    #[test]
    fn test_fallback_downgrades_once() {
        let selector = StrategySelector::default();
        let strategy = select(
            Some("gpt-4.1"),
            RequestContext::new("hi").with_reasoning_effort(ReasoningEffort::Medium),
        );
        assert_eq!(strategy.flavor, CallFlavor::ReasoningCapable);

        let fallback = selector.fallback(&strategy).unwrap();
        assert_eq!(fallback.flavor, CallFlavor::StandardCompletion);
        assert_eq!(fallback.token_limit_param, TokenLimitParam::MaxTokens);
        assert_eq!(fallback.instruction_role, InstructionRole::System);
        assert_eq!(fallback.reasoning_effort, None);
        assert_eq!(fallback.model, "gpt-4.1");

        assert!(selector.fallback(&fallback).is_none());
    }
}
