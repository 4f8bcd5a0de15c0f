//! Configuration system for ytharvest.
//!
//! Layered configuration, lowest priority first:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/ytharvest/config.toml`
//! 3. **Environment variables** - `YTHARVEST_*` prefix
//! 4. **CLI arguments** - applied by the binary, always win
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/ytharvest/ytharvest.db"
//!
//! [api]
//! key = "your-api-key"
//! page_limit = 5
//! page_size = 10
//!
//! [output]
//! format = "text"
//! colors = true
//! ```

use crate::api::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use crate::error::{HarvestError, Result, ResultExt};
use crate::fetch::{DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
}

/// Path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `YTHARVEST_DB`
    pub db: Option<PathBuf>,
}

/// Remote API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API access token.
    /// Environment variable: `YTHARVEST_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Environment variable: `YTHARVEST_API_BASE`
    pub base_url: String,

    /// Playlist pages walked per ingest.
    /// Environment variable: `YTHARVEST_PAGE_LIMIT`
    pub page_limit: usize,

    /// Playlist entries per page (max 50).
    /// Environment variable: `YTHARVEST_PAGE_SIZE`
    pub page_size: usize,

    pub timeout_secs: u64,
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty, csv.
    pub format: String,

    /// Enable colored output.
    pub colors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            base_url: DEFAULT_API_BASE.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from the user config file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the user config file exists
    /// but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::user_config_path();
        Self::load_layered(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from an explicit file (if it exists) and an env lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the file cannot be read or parsed.
    pub fn load_layered(
        path: Option<&Path>,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?.unwrap_or_default(),
            None => Self::default(),
        };
        config.apply_env_overrides(env_lookup);
        debug!(db = ?config.paths.db, api_base = %config.api.base_url, "Configuration loaded");
        Ok(config)
    }

    /// Parse a config file. A missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| HarvestError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|e| HarvestError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(Some(config))
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ytharvest").join("config.toml"))
    }

    fn apply_env_overrides(&mut self, env_lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| env_lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db) = lookup("YTHARVEST_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Some(key) = lookup("YTHARVEST_API_KEY") {
            self.api.key = Some(key.trim().to_string());
        }
        if let Some(base) = lookup("YTHARVEST_API_BASE") {
            self.api.base_url = base;
        }
        if let Some(n) = lookup("YTHARVEST_PAGE_LIMIT").and_then(|v| v.trim().parse().ok()) {
            self.api.page_limit = n;
        }
        if let Some(n) = lookup("YTHARVEST_PAGE_SIZE").and_then(|v| v.trim().parse().ok()) {
            self.api.page_size = n;
        }
        if let Some(format) = lookup("YTHARVEST_FORMAT") {
            self.output.format = format;
        }
        if env_lookup("YTHARVEST_NO_COLOR").is_some() || env_lookup("NO_COLOR").is_some() {
            self.output.colors = false;
        }
    }

    /// Get the database path, using defaults if not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(crate::default_db_path)
    }

    /// Save the configuration to a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| HarvestError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).context(format!("writing {}", path.display()))?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }
}
