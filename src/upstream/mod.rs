pub mod client;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;

pub use client::TmdbClient;
pub use retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream timed out: {url}")]
    Timeout { url: String },
    #[error("Could not connect to upstream: {url}")]
    Connect { url: String },
    #[error("Upstream returned HTTP {status}: {url}")]
    Http { status: u16, url: String },
    #[error("Upstream request failed: {url}: {message}")]
    Request { url: String, message: String },
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Read-only view of the movie catalog API. Results are the raw upstream JSON.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn trending(&self) -> UpstreamResult<Value>;
    async fn details(&self, movie_id: u64) -> UpstreamResult<Value>;
    async fn search(&self, query: &str) -> UpstreamResult<Value>;
}
