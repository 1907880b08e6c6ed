pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use cli::Commands;

pub use application::{
    ChatEventStream, ChatResponseUseCase, CompletionBackend, ConversationHistoryUseCase,
    FailureIsolation, GenerationSettings, HistoryFormatter, MessageRepository, ModelCatalog,
    RegisterUserUseCase, ResponseNormalizer, SendMessageUseCase, StrategySelector,
    UserRepository,
};

pub use connector::{
    AzureOpenAiClient, BackendSettings, Container, ContainerConfig, DuckdbChatStore,
    InMemoryChatStore, MockBackend, Router,
};

pub use domain::{
    CallFlavor, ConversationTurn, DomainError, ModelDescriptor, ReasoningEffort, RequestContext,
    ResponseResult, Role, StoredMessage, Strategy, StreamEvent, User,
};
