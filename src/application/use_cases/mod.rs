mod chat_response;
mod conversation_history;
mod failure_isolation;
mod history_formatter;
mod model_catalog;
mod register_user;
mod response_normalizer;
mod send_message;
mod strategy_selector;

pub use chat_response::*;
pub use conversation_history::*;
pub use failure_isolation::*;
pub use history_formatter::*;
pub use model_catalog::*;
pub use register_user::*;
pub use response_normalizer::*;
pub use send_message::*;
pub use strategy_selector::*;
