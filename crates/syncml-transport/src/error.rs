//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur while exchanging a request with a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be delivered.
    #[error("request failed: {0}")]
    Request(String),

    /// The peer answered with a non-success status.
    #[error("peer answered with status {0}")]
    Status(u16),

    /// The peer closed the exchange without a response.
    #[error("no response from peer")]
    NoResponse,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
