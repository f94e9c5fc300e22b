//! Error types for the SyncML core.

use thiserror::Error;

/// Errors raised while reading or building capability documents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The capability document declares a schema version we do not speak.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    ProtocolVersionMismatch { expected: String, found: String },

    /// A required element is absent.
    #[error("missing element: {0}")]
    MissingElement(String),

    /// An element holds a value that cannot be interpreted.
    #[error("invalid value for {element}: {value:?}")]
    InvalidValue { element: String, value: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
