mod azure_openai_client;
mod duckdb_chat_store;
mod in_memory_chat_store;
mod mock_backend;

pub use azure_openai_client::*;
pub use duckdb_chat_store::*;
pub use in_memory_chat_store::*;
pub use mock_backend::*;
