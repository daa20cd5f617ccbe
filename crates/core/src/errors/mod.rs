//! Error types for metasync operations

mod builders;
mod conversions;
mod types;

pub use types::{Error, Result};
