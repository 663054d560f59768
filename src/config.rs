//! Configuration management for emberchain

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: default_listen_addr(),
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_sync_interval_secs() -> u64 {
    60
}

/// Loads `config.toml` from the data directory. An absent file yields
/// defaults; an unreadable or invalid one is an error.
pub fn load_config(data_dir: &Path) -> Result<Config> {
    let path = data_dir.join("config.toml");
    let config: Config = match std::fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).map_err(|e| ChainError::Config(e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(e.into()),
    };

    if config.listen_addr.is_empty() {
        return Err(ChainError::Config("listen_addr must be set".to_string()));
    }
    if config.sync_interval_secs == 0 {
        return Err(ChainError::Config(
            "sync_interval_secs must be positive".to_string(),
        ));
    }

    Ok(config)
}
