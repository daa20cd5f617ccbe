//! Retry with exponential backoff.
//!
//! ## Key Components
//!
//! - **`config`**: `RetryConfig` and the backoff delay calculation.
//! - **`retry`**: Bounded retry of operations that fail transiently.

pub mod config;
pub mod retry;

pub use config::RetryConfig;
pub use retry::retry;
