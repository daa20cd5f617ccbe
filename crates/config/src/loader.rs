//! Configuration loader for metasync
//!
//! Resolves the configuration file (explicit path, then `METASYNC_CONFIG`),
//! falls back to defaults when none is given, and applies environment
//! overrides last.

use crate::config::Config;
use metasync_core::{
    Error, Result, METASYNC_CONFIG_VAR, METASYNC_REFRESH_INTERVAL_VAR, METASYNC_STORE_PATH_VAR,
};
use std::path::{Path, PathBuf};

/// Configuration loader that handles all startup configuration
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Explicit configuration file
    path: Option<PathBuf>,
    /// Whether environment overrides are applied
    apply_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            path: None,
            apply_env: true,
        }
    }

    /// Set the configuration file to load
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set whether `METASYNC_*` environment variables override file values
    pub fn apply_env(mut self, apply: bool) -> Self {
        self.apply_env = apply;
        self
    }

    /// Load the configuration
    pub fn load(self) -> Result<Config> {
        let path = self.path.clone().or_else(|| {
            if self.apply_env {
                std::env::var_os(METASYNC_CONFIG_VAR).map(PathBuf::from)
            } else {
                None
            }
        });

        let mut config = match path {
            Some(path) => read_config_file(&path)?,
            None => {
                tracing::debug!("no configuration file given, using defaults");
                Config::default()
            }
        };

        if self.apply_env {
            apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(path, "read configuration file", e))?;
    let config = Config::from_json_str(&content)?;
    tracing::debug!(path = %path.display(), "loaded configuration file");
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(value) = std::env::var(METASYNC_REFRESH_INTERVAL_VAR) {
        config.metric_meta.refresh_interval = value.trim().parse().map_err(|_| {
            Error::configuration(format!(
                "{METASYNC_REFRESH_INTERVAL_VAR} must be a whole number of seconds, got '{value}'"
            ))
        })?;
    }

    if let Some(path) = std::env::var_os(METASYNC_STORE_PATH_VAR) {
        config.store.path = PathBuf::from(path);
    }

    Ok(())
}
