//! Error types for xconf
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using XconfError
pub type Result<T> = std::result::Result<T, XconfError>;

/// Error a change callback may hand back to the watch loop
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of change callbacks
pub type CallbackResult = std::result::Result<(), CallbackError>;

/// Unified error type for xconf operations
#[derive(Debug, Error)]
pub enum XconfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Key absent in the store
    #[error("Key not found")]
    NotFound,

    /// Entry absent in the local cache (fallback trigger, not a fault)
    #[error("Cache miss")]
    CacheMiss,

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Cache error: {0}")]
    Cache(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: i64,
        actual: i64,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for XconfError {
    fn from(err: serde_json::Error) -> Self {
        XconfError::Decode(err.to_string())
    }
}

impl XconfError {
    /// True for the "absent" signals (`NotFound`, `CacheMiss`)
    pub fn is_not_found(&self) -> bool {
        matches!(self, XconfError::NotFound | XconfError::CacheMiss)
    }
}
