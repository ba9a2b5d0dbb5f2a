//! Core configuration, stored as JSON next to the host app's data.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::DEFAULT_CACHE_KEY;
use crate::query::DEFAULT_PAGE_SIZE;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Core configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file holding the record cache
    pub database_path: String,
    /// Key the record list is cached under
    pub cache_key: String,
    /// Records per page in the list view
    pub page_size: usize,
    /// tracing filter directive, e.g. "info" or "health_records_core=debug"
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: "health_records.db".to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a JSON file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        info!("Loading config from {:?}", path);
        let json = fs::read_to_string(path)?;
        let config: CoreConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(path).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid config at {:?}, using defaults", path);
            Self::default()
        })
    }

    /// Write configuration as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.cache_key.trim().is_empty() {
            return Err(ConfigError::Invalid("cache_key must not be empty".into()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".into()));
        }
        Ok(())
    }
}
