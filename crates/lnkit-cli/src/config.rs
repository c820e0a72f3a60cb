//! Settings
//!
//! Read from the config file if present, then `LNKIT_` prefixed environment
//! variables (`LNKIT_DATABASE__PATH`, `LNKIT_LOG__LEVEL`).

use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Name of the store file inside the work dir
pub const DEFAULT_DB_FILE: &str = "payments.redb";

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// Store file, defaults to `<work-dir>/payments.redb`
    pub path: Option<PathBuf>,
}

/// Log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Level used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// lnkit-paydb settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Database settings
    #[serde(default)]
    pub database: Database,
    /// Log settings
    #[serde(default)]
    pub log: Log,
}

impl Settings {
    /// Load settings from `config_file` and the environment
    pub fn new(config_file: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_file).required(false))
            .add_source(Environment::with_prefix("LNKIT").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Store file to open
    pub fn db_path(&self, work_dir: &Path) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| work_dir.join(DEFAULT_DB_FILE))
    }
}
