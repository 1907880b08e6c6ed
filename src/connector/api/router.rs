use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{ChatController, ModelsController};

pub struct Router<'a> {
    chat_controller: ChatController<'a>,
    models_controller: ModelsController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            chat_controller: ChatController::new(container),
            models_controller: ModelsController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Models => self.models_controller.list().await,
            Commands::Chat {
                message,
                model,
                reasoning_effort,
                developer,
                image,
                stream,
            } => {
                self.chat_controller
                    .chat(message, model, reasoning_effort, developer, image, stream)
                    .await
            }
            Commands::Serve { .. } => unreachable!("serve command is handled separately in main"),
        }
    }
}
