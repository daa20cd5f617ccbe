//! Configuration parsing and management for metasync
//!
//! This crate handles loading the JSON configuration file and applying
//! environment variable overrides on top of it.

pub mod config;
pub mod loader;


pub use config::*;
pub use loader::ConfigLoader;
