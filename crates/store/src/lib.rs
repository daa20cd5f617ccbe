//! Versioned metadata store for metasync
//!
//! This crate provides the store contract the synchronization engine writes
//! against, plus two implementations:
//! - `MemoryStore`: process-local, with fault injection for tests
//! - `FileStore`: a JSON document shared between processes through an
//!   advisory file lock

pub mod backend;
pub mod document;
pub mod file;
pub mod memory;

pub use backend::*;
pub use document::{Database, StoreDocument};
pub use file::FileStore;
pub use memory::{MemoryStore, StoreStats};
