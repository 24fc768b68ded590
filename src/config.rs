use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::pool::PoolSpec;
use crate::registry::{RegistrySettings, DEFAULT_ENUMERATION_LIMIT};

/// Top-level configuration that mirrors the YAML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Pools created at startup when missing
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default filter for env_logger, overridden by RUST_LOG
    pub log_level: String,
    /// Snapshot file; pools are kept in memory only when absent
    pub state_file: Option<PathBuf>,
    /// Largest block whose addresses are listed (default 256)
    pub enumeration_limit: Option<u64>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid pool configuration: {0}")]
    InvalidPool(String),
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.log_level.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "log_level cannot be empty".to_string(),
            ));
        }
        if self.general.enumeration_limit == Some(0) {
            return Err(ValidationError::InvalidGeneral(
                "enumeration_limit must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.pools {
            if !seen.insert(spec.name()) {
                return Err(ValidationError::InvalidPool(format!(
                    "pool '{}' is declared more than once",
                    spec.name()
                )));
            }
        }

        Ok(())
    }

    /// Registry settings derived from the general section
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            enumeration_limit: self
                .general
                .enumeration_limit
                .map_or(DEFAULT_ENUMERATION_LIMIT, u128::from),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            state_file: None,
            enumeration_limit: None,
        }
    }
}
