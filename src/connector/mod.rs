//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Completion backends (Azure OpenAI over HTTP, deterministic mock)
//! - Chat storage (DuckDB file, in-memory)
//! - Delivery: CLI controllers and the HTTP server

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::{Container, ContainerConfig, Router};
