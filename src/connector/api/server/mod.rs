//! HTTP surface: JSON endpoints plus server-sent events for streamed replies.

mod chat;
mod error;
mod messages;
mod models;
mod params;
mod upload;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tracing::info;

use super::Container;

pub use error::ApiError;

pub type AppState = Arc<Container>;

/// Uploads and inline images are base64 in JSON bodies.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn app(container: Arc<Container>) -> axum::Router {
    axum::Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/models", get(models::list_models))
        .route("/api/users", post(users::register_user))
        .route("/api/messages", get(messages::list_messages))
        .route("/api/messages/clear", post(messages::clear_messages))
        .route("/api/messages/{id}/image", get(messages::message_image))
        .route("/api/upload-image", post(upload::upload_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(container)
}

pub async fn serve(container: Arc<Container>, port: u16, public: bool) -> Result<()> {
    let host = if public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let addr = SocketAddr::from((host, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Serving chat relay on http://{} (backend: {})",
        addr,
        container.backend_name()
    );
    axum::serve(listener, app(container))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
