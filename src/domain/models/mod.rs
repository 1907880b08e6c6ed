mod backend;
mod conversation;
mod model_descriptor;
mod request_context;
mod response;
mod stored_message;
mod strategy;

pub use backend::*;
pub use conversation::*;
pub use model_descriptor::*;
pub use request_context::*;
pub use response::*;
pub use stored_message::*;
pub use strategy::*;
