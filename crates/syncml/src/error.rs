//! Error types for the engine.

use syncml_core::CoreError;
use syncml_store::StoreError;
use syncml_transport::TransportError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum SyncmlError {
    /// Model or capability document error.
    #[error("model error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The adapter, peer, store or route does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation contradicts existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage connection could not be opened.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl SyncmlError {
    /// True when the storage connection or a transaction could not be obtained.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            SyncmlError::StorageUnavailable(_) | SyncmlError::Store(StoreError::Unavailable(_))
        )
    }

    /// True for unique-index or state conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SyncmlError::Conflict(_) | SyncmlError::Store(StoreError::Conflict(_))
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncmlError>;
