use tracing::debug;

use crate::domain::{ModelCapabilities, ModelDescriptor, ParameterDialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdMatch {
    Exact,
    Prefix,
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy)]
struct CapabilityRule {
    pattern: &'static str,
    matching: IdMatch,
    capabilities: ModelCapabilities,
}

const fn rule(
    pattern: &'static str,
    matching: IdMatch,
    capabilities: ModelCapabilities,
) -> CapabilityRule {
    CapabilityRule {
        pattern,
        matching,
        capabilities,
    }
}

use ParameterDialect::{ReasoningSeries, Standard};

// Ordered most specific first: the first matching row wins.
const CAPABILITY_TABLE: &[CapabilityRule] = &[
    rule("o4-mini", IdMatch::Prefix, ModelCapabilities::new(true, true, true, ReasoningSeries)),
    rule("o3-mini", IdMatch::Prefix, ModelCapabilities::new(false, true, true, ReasoningSeries)),
    rule("o3", IdMatch::Prefix, ModelCapabilities::new(true, true, true, ReasoningSeries)),
    rule("o1-mini", IdMatch::Prefix, ModelCapabilities::new(false, true, false, ReasoningSeries)),
    rule("o1", IdMatch::Prefix, ModelCapabilities::new(true, false, false, ReasoningSeries)),
    rule("gpt-4.1", IdMatch::Prefix, ModelCapabilities::new(true, true, true, Standard)),
    rule("gpt-4o", IdMatch::Prefix, ModelCapabilities::new(true, true, false, Standard)),
    rule("gpt-4-turbo", IdMatch::Prefix, ModelCapabilities::new(true, true, false, Standard)),
    rule("gpt-4", IdMatch::Exact, ModelCapabilities::new(false, true, false, Standard)),
    rule("gpt-35-turbo", IdMatch::Prefix, ModelCapabilities::new(false, true, false, Standard)),
    rule("gpt-3.5-turbo", IdMatch::Prefix, ModelCapabilities::new(false, true, false, Standard)),
];

/// Capabilities assumed for a default deployment that matches no table row.
const UNKNOWN_MODEL_CAPABILITIES: ModelCapabilities =
    ModelCapabilities::new(false, true, false, Standard);

/// (id, display name, description) of the deployments offered to callers.
const CATALOG: &[(&str, &str, &str)] = &[
    ("gpt-4o", "Azure GPT-4o", "Latest and most capable Azure OpenAI model with vision support"),
    ("gpt-4.1", "Azure GPT-4.1", "Azure OpenAI model with advanced capabilities and strong reasoning"),
    ("gpt-4.1-mini", "Azure GPT-4.1-mini", "More efficient version of Azure GPT-4.1"),
    ("o3", "Azure O3", "Azure OpenAI model with advanced reasoning and generation capabilities"),
    ("o3-mini", "Azure O3-mini", "More efficient version of Azure O3"),
    ("o1", "Azure O1", "Azure OpenAI reasoning model without native streaming"),
];

/// Looks up capability flags for a model id from the capability table.
pub fn capabilities_for(model_id: &str) -> Option<ModelCapabilities> {
    let id = model_id.trim().to_lowercase();
    CAPABILITY_TABLE
        .iter()
        .find(|rule| match rule.matching {
            IdMatch::Exact => id == rule.pattern,
            IdMatch::Prefix => id.starts_with(rule.pattern),
        })
        .map(|rule| rule.capabilities)
}

/// Static registry of backend deployments and what each can do.
///
/// Built once at startup. Lookups never fail: an absent or unrecognized id
/// resolves to the configured default deployment.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
    default_model: ModelDescriptor,
}

impl ModelCatalog {
    pub fn new(default_model_id: impl Into<String>) -> Self {
        let models: Vec<ModelDescriptor> = CATALOG
            .iter()
            .map(|(id, name, description)| {
                let capabilities = capabilities_for(id).unwrap_or(UNKNOWN_MODEL_CAPABILITIES);
                ModelDescriptor::new(*id, *name, *description, capabilities)
            })
            .collect();

        let default_id: String = default_model_id.into();
        let default_model = Self::find_exact(&models, &default_id).cloned().unwrap_or_else(|| {
            let capabilities = capabilities_for(&default_id).unwrap_or(UNKNOWN_MODEL_CAPABILITIES);
            ModelDescriptor::new(
                default_id.clone(),
                default_id.clone(),
                "Configured default deployment",
                capabilities,
            )
        });

        Self {
            models,
            default_model,
        }
    }

    fn find_exact<'a>(models: &'a [ModelDescriptor], id: &str) -> Option<&'a ModelDescriptor> {
        let id = id.trim();
        models.iter().find(|m| m.id().eq_ignore_ascii_case(id))
    }

    pub fn list_models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn default_model(&self) -> &ModelDescriptor {
        &self.default_model
    }

    /// Resolve a requested model id to a descriptor.
    ///
    /// Catalogued ids return their entry. Uncatalogued ids that still match a
    /// capability rule (e.g. dated snapshots such as `o3-2025-04-16`) get a
    /// descriptor under their own id. Anything else resolves to the default.
    pub fn resolve(&self, model_id: Option<&str>) -> ModelDescriptor {
        let Some(requested) = model_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return self.default_model.clone();
        };

        if let Some(descriptor) = Self::find_exact(&self.models, requested) {
            return descriptor.clone();
        }
        if self.default_model.id().eq_ignore_ascii_case(requested) {
            return self.default_model.clone();
        }

        match capabilities_for(requested) {
            Some(capabilities) => {
                debug!("Model '{}' not catalogued, using capability rules", requested);
                ModelDescriptor::new(requested, requested, "Uncatalogued deployment", capabilities)
            }
            None => {
                debug!(
                    "Model '{}' not recognized, using capabilities of default '{}'",
                    requested,
                    self.default_model.id()
                );
                self.default_model.clone()
            }
        }
    }
}
