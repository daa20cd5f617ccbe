//! Shared utilities for metasync
//!
//! Tracing setup, retry with backoff, and atomic file writes used by the
//! store and the metadata service.

pub mod atomic_file;
pub mod resilience;
pub mod tracing;

pub use atomic_file::*;
pub use resilience::*;
