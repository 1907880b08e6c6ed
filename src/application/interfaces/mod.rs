mod completion_backend;
mod message_repository;
mod user_repository;

pub use completion_backend::*;
pub use message_repository::*;
pub use user_repository::*;
