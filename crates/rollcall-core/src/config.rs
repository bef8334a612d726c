//! Application configuration management.
//!
//! Configuration is read from `~/.config/rollcall/config.json` and then
//! overridden by environment variables:
//!
//! - `ROLLCALL_API_URL`: API base URL
//! - `ROLLCALL_VAULT`: token storage backend (`auto`, `keyring`, `file`, `memory`)
//! - `ROLLCALL_TIMEOUT_SECS`: per-request timeout; unset means no timeout
//!
//! A missing API base URL is only warned about; requests fail later with
//! `ApiError::MissingBaseUrl`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::vault::file::TOKEN_FILE;
use crate::vault::VaultBackend;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "rollcall";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "ROLLCALL_API_URL";
pub const ENV_VAULT: &str = "ROLLCALL_VAULT";
pub const ENV_TIMEOUT_SECS: &str = "ROLLCALL_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub vault_backend: VaultBackend,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Override fields from environment-style lookups. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = Some(url.trim().to_string());
        }
        if let Some(backend) = lookup(ENV_VAULT) {
            self.vault_backend = backend
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {}: {}", ENV_VAULT, e))?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid {}: {}", ENV_TIMEOUT_SECS, secs))?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    /// Log a warning for settings the client cannot work without
    pub fn warn_if_incomplete(&self) {
        if self.api_base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            warn!(
                "{} is not defined. API calls will fail. Add it to your .env file or {}.",
                ENV_API_URL, CONFIG_FILE
            );
        }
    }

    /// Per-request timeout; `None` means requests may run indefinitely
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the file vault keeps tokens
    pub fn token_file(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(TOKEN_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
