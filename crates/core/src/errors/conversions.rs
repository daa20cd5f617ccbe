//! Error conversion utilities

use super::types::Error;

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Serialization {
            context: "json document".to_string(),
            source,
        }
    }
}
