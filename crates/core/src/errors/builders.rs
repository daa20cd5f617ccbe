//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;

impl Error {
    /// Create a store unavailable error
    #[must_use]
    pub fn store_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with the path and operation that failed
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid observation error
    #[must_use]
    pub fn invalid_observation(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidObservation {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Check if this error is transient and the operation can be retried later
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. } | Error::Io { .. })
    }
}
