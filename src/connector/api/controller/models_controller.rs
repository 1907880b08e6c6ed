use anyhow::Result;

use crate::domain::ModelDescriptor;

use super::super::Container;

pub struct ModelsController<'a> {
    container: &'a Container,
}

impl<'a> ModelsController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn list(&self) -> Result<String> {
        let catalog = self.container.catalog();
        Ok(self.format_models(catalog.list_models(), catalog.default_model().id()))
    }

    fn format_models(&self, models: &[ModelDescriptor], default_id: &str) -> String {
        let mut output = "Available models:\n\n".to_string();
        for model in models {
            let marker = if model.id() == default_id { " (default)" } else { "" };
            output.push_str(&format!("  {}{}\n", model.id(), marker));
            output.push_str(&format!("    {}: {}\n", model.display_name(), model.description()));

            let mut features = Vec::new();
            if model.supports_vision() {
                features.push("vision");
            }
            if model.supports_streaming() {
                features.push("streaming");
            }
            if model.supports_reasoning_summary() {
                features.push("reasoning summary");
            }
            output.push_str(&format!(
                "    Features: {}, Parameters: {}\n",
                if features.is_empty() { "none".to_string() } else { features.join(", ") },
                model.parameter_dialect().as_str()
            ));
            output.push('\n');
        }
        output
    }
}
