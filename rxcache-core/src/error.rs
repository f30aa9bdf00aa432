//! Error types for RxCache operations

use thiserror::Error;

/// Storage layer errors.
///
/// Read failures are always surfaced to the active strategy. Write failures
/// raised during write-through are logged by the engine and never reach the
/// caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Delete failed for key {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors raised by the caller-supplied asynchronous producer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source failed: {reason}")]
    Failed { reason: String },
}

impl SourceError {
    /// Build a generic source failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl From<String> for SourceError {
    fn from(reason: String) -> Self {
        Self::Failed { reason }
    }
}

impl From<&str> for SourceError {
    fn from(reason: &str) -> Self {
        Self::failed(reason)
    }
}

/// Request configuration errors. Raised eagerly when a request is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed key pattern '{pattern}': {reason}")]
    MalformedKeyPattern { pattern: String, reason: String },

    #[error("Key pattern '{pattern}' expects {expected} argument(s), got {got}")]
    ArgumentCountMismatch {
        pattern: String,
        expected: usize,
        got: usize,
    },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all RxCache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Returns true if this error came from the asynchronous producer.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if this error came from the storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for RxCache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
