//! Runtime configuration, read from an optional `eavkit.toml`.
//!
//! ```toml
//! schema_cache_ttl_secs = 60
//!
//! [database]
//! path = "data/app.db"
//! busy_timeout_secs = 5
//! foreign_keys = true
//! ```

use crate::core::error::EavError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SCHEMA_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EavConfig {
    /// How long a table's column list is trusted before it is re-introspected.
    pub schema_cache_ttl_secs: u64,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` opens a private in-memory database.
    pub path: Option<String>,
    pub busy_timeout_secs: u64,
    pub foreign_keys: bool,
}

impl Default for EavConfig {
    fn default() -> Self {
        Self {
            schema_cache_ttl_secs: DEFAULT_SCHEMA_CACHE_TTL_SECS,
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
            foreign_keys: true,
        }
    }
}

impl EavConfig {
    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EavError> {
        Ok(toml::from_str(content)?)
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

/// Load config from a TOML file. A missing file means defaults, not an error.
pub fn load_config(path: &Path) -> Result<EavConfig, EavError> {
    if !path.exists() {
        return Ok(EavConfig::default());
    }
    let content = fs::read_to_string(path).map_err(EavError::IoError)?;
    EavConfig::from_toml_str(&content)
}
