use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::application::{
    ChatResponseUseCase, CompletionBackend, ConversationHistoryUseCase, GenerationSettings,
    MessageRepository, ModelCatalog, RegisterUserUseCase, SendMessageUseCase, UserRepository,
};
use crate::connector::adapter::{
    AzureOpenAiClient, BackendSettings, DuckdbChatStore, InMemoryChatStore, MockBackend,
    DEFAULT_DEPLOYMENT,
};

const DATABASE_FILE: &str = "chatrelay.duckdb";

pub struct ContainerConfig {
    pub data_dir: String,
    /// Keep users and messages in process memory instead of DuckDB.
    pub memory_storage: bool,
    /// Answer from the in-process mock instead of Azure OpenAI. No credentials
    /// are needed.
    pub mock_backend: bool,
    pub generation: GenerationSettings,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.chatrelay".to_string(),
            memory_storage: false,
            mock_backend: false,
            generation: GenerationSettings::default(),
        }
    }
}

pub struct Container {
    catalog: Arc<ModelCatalog>,
    backend: Arc<dyn CompletionBackend>,
    user_repo: Arc<dyn UserRepository>,
    message_repo: Arc<dyn MessageRepository>,
    config: ContainerConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let (backend, default_model): (Arc<dyn CompletionBackend>, String) = if config.mock_backend {
            info!("Using mock completion backend");
            let default_model = std::env::var("AZURE_OPENAI_DEPLOYMENT_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());
            (Arc::new(MockBackend::new()), default_model)
        } else {
            let settings = BackendSettings::from_env()?;
            debug!("Azure OpenAI settings: {:?}", settings);
            let default_model = settings.default_deployment.clone();
            (Arc::new(AzureOpenAiClient::new(settings)?), default_model)
        };

        let (user_repo, message_repo): (Arc<dyn UserRepository>, Arc<dyn MessageRepository>) =
            if config.memory_storage {
                debug!("Using in-memory chat storage");
                let store = Arc::new(InMemoryChatStore::new());
                (store.clone(), store)
            } else {
                let db_path = PathBuf::from(&config.data_dir).join(DATABASE_FILE);
                match DuckdbChatStore::new(&db_path) {
                    Ok(store) => {
                        debug!("Using DuckDB chat storage at {:?}", db_path);
                        let store = Arc::new(store);
                        (store.clone(), store)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to initialize DuckDB ({}): {}. Falling back to in-memory storage.",
                            db_path.display(),
                            e
                        );
                        let store = Arc::new(InMemoryChatStore::new());
                        (store.clone(), store)
                    }
                }
            };

        Ok(Self {
            catalog: Arc::new(ModelCatalog::new(default_model)),
            backend,
            user_repo,
            message_repo,
            config,
        })
    }

    /// Assemble a container from ready-made parts, with in-memory storage.
    pub fn with_backend(
        backend: Arc<dyn CompletionBackend>,
        default_model: &str,
        config: ContainerConfig,
    ) -> Self {
        let store = Arc::new(InMemoryChatStore::new());
        Self {
            catalog: Arc::new(ModelCatalog::new(default_model)),
            backend,
            user_repo: store.clone(),
            message_repo: store,
            config,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn chat_use_case(&self) -> ChatResponseUseCase {
        ChatResponseUseCase::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.config.generation,
        )
    }

    pub fn send_message_use_case(&self) -> SendMessageUseCase {
        SendMessageUseCase::new(self.chat_use_case(), self.message_repo.clone())
    }

    pub fn register_user_use_case(&self) -> RegisterUserUseCase {
        RegisterUserUseCase::new(self.user_repo.clone())
    }

    pub fn conversation_history_use_case(&self) -> ConversationHistoryUseCase {
        ConversationHistoryUseCase::new(self.message_repo.clone())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}
