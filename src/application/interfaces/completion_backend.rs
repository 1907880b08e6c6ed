use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{BackendRequest, BackendResponse, BackendStreamEvent, DomainError};

/// Incremental events from an open backend stream. Dropping the stream closes
/// the underlying connection.
pub type BackendEventStream = BoxStream<'static, Result<BackendStreamEvent, DomainError>>;

/// A hosted completion service.
///
/// Implementors own transport, authentication and the rendering of a
/// [`BackendRequest`] for the endpoint its strategy selects. Higher layers only
/// see [`BackendResponse`] and [`BackendStreamEvent`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Perform one non-streaming call.
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, DomainError>;

    /// Open a streaming call. Errors before the first event are returned here;
    /// later failures arrive as `Err` items on the stream.
    async fn stream(&self, request: &BackendRequest) -> Result<BackendEventStream, DomainError>;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Remove anything secret from a diagnostic before it leaves the service.
    fn sanitize(&self, diagnostic: &str) -> String {
        diagnostic.to_string()
    }
}
