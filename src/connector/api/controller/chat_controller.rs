use std::io::Write;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;

use crate::domain::{ReasoningEffort, RequestContext, ResponseResult, StreamEvent};

use super::super::Container;

pub struct ChatController<'a> {
    container: &'a Container,
}

impl<'a> ChatController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn chat(
        &self,
        message: String,
        model: Option<String>,
        reasoning_effort: Option<String>,
        developer: Option<String>,
        image: Option<String>,
        stream: bool,
    ) -> Result<String> {
        let image_data = match image {
            Some(path) => {
                let bytes = std::fs::read(&path).with_context(|| format!("Failed to read image {}", path))?;
                Some(STANDARD.encode(bytes))
            }
            None => None,
        };
        if message.trim().is_empty() && image_data.is_none() {
            bail!("Message is required");
        }

        let mut ctx = RequestContext::new(message).with_streaming(stream);
        if let Some(model) = model {
            ctx = ctx.with_model(model);
        }
        if let Some(effort) = reasoning_effort.as_deref().and_then(ReasoningEffort::parse) {
            ctx = ctx.with_reasoning_effort(effort);
        }
        if let Some(developer) = developer {
            ctx = ctx.with_developer_message(developer);
        }
        if let Some(image_data) = image_data {
            ctx = ctx.with_image(image_data);
        }

        let use_case = self.container.chat_use_case();
        if !stream {
            let result = use_case.get_response(&ctx).await;
            return Ok(self.format_result(&result));
        }

        let mut events = use_case.stream_response(&ctx);
        let mut stdout = std::io::stdout();
        let mut summary = None;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Fragment { text } => {
                    write!(stdout, "{}", text)?;
                    stdout.flush()?;
                }
                StreamEvent::Final {
                    reasoning_summary, ..
                } => summary = reasoning_summary,
            }
        }
        writeln!(stdout)?;

        Ok(summary
            .map(|s| format!("\nReasoning summary:\n{}", s))
            .unwrap_or_default())
    }

    fn format_result(&self, result: &ResponseResult) -> String {
        match result.reasoning_summary() {
            Some(summary) => format!("{}\n\nReasoning summary:\n{}", result.text(), summary),
            None => result.text().to_string(),
        }
    }
}
