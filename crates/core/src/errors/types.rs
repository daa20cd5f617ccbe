//! Core error type definitions

use std::path::PathBuf;

/// Result type alias for metasync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for metasync operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The persistent store could not be reached or refused the request
    #[error("store unavailable during {operation}: {message}")]
    StoreUnavailable { operation: String, message: String },

    /// File system operations against a file-backed store
    #[error("I/O error during {operation} on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be encoded or decoded
    #[error("serialization error in {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// An observation that would corrupt the aggregate
    #[error("invalid observation for metric '{metric}': {message}")]
    InvalidObservation { metric: String, message: String },

    /// A full flush or drain left metrics unpersisted
    #[error("flush incomplete, {} metric(s) not persisted: {}", failed.len(), failed.join(", "))]
    FlushIncomplete { failed: Vec<String> },

    /// The service has been drained and accepts no further work
    #[error("metadata service is stopped")]
    Stopped,
}
