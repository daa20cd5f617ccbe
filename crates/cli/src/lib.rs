//! Command line front end for metasync
//!
//! The binary wires configuration, the file-backed store and the metadata
//! service together; the subcommands live in [`commands`].

pub mod commands;

use metasync_cache::MetaService;
use metasync_config::Config;
use metasync_store::{FileStore, MetaStore};
use std::sync::Arc;

/// Store described by the `store` section of the configuration
pub fn open_store(config: &Config) -> Arc<dyn MetaStore> {
    Arc::new(FileStore::new(
        config.store.path.clone(),
        config.store.database_name.clone(),
    ))
}

/// Metadata service over the configured store
pub fn open_service(config: &Config) -> metasync_core::Result<MetaService> {
    MetaService::from_config(config, open_store(config))
}
