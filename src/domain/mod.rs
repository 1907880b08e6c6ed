//! # Domain Layer
//!
//! Chat data model, backend message/response shapes and the error type.
//! This layer is independent of HTTP clients, storage engines and web frameworks.

pub mod error;
pub mod models;

pub use error::*;
pub use models::*;
