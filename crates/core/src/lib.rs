//! Core domain types, errors, and constants for `metasync`.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing every failure mode of the metadata synchronization engine.
//! - **`types`**: The `MetricAggregate` record kept in memory and persisted to
//!   the shared store, together with the merge rules used on reconciliation.
//! - **`constants`**: Shared defaults and environment variable names.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    types::*,
};
