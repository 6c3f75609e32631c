//! Datastore configuration.
//!
//! ```toml
//! name = "running"
//! lock_timeout_ms = 500
//! save_holder = "json_save"
//! pretty = true
//!
//! [policy]
//! write_default = "permit"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::lock::DEFAULT_LOCK_TIMEOUT;
use crate::policy::PolicyConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Name reported in lock errors and logs.
    pub name: String,
    pub lock_timeout_ms: u64,
    /// Lock holder recorded while saving.
    pub save_holder: String,
    /// Pretty-print saved documents.
    pub pretty: bool,
    /// Access rules; no section means no access control.
    pub policy: Option<PolicyConfig>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            name: "running".to_string(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            save_holder: "json_save".to_string(),
            pretty: true,
            policy: None,
        }
    }
}

impl DatastoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
