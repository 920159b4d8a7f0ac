//! The byte-moving collaborator the dispatcher sends batches through.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP status {0}")]
    Status(u16),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("timeout waiting for response")]
    Timeout,
    #[error("transport closed")]
    Closed,
}

/// A JSON-RPC transport.
///
/// `envelope` is either one request object or an array of them. The reply is
/// one response object or an array; implementations need not preserve
/// request order in the reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Value) -> Result<Value, TransportError>;
}
