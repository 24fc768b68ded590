use crate::config::Config;
use crate::error::PoolError;
use crate::registry::PoolRegistry;
use crate::store::{MemoryStore, PoolStore, SnapshotStore};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration {:?}", config_path))?;
    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration {:?}", config_path))?;

    config.validate()?;
    info!("Configuration declares {} pools", config.pools.len());

    Ok(config)
}

/// Open the registry described by `config`.
///
/// `state_override` takes precedence over `general.state_file`. Without
/// either, pools live in memory for the life of the process.
pub fn open_registry(config: &Config, state_override: Option<&Path>) -> Result<PoolRegistry> {
    let state_file: Option<PathBuf> = state_override
        .map(Path::to_path_buf)
        .or_else(|| config.general.state_file.clone());

    let store: Arc<dyn PoolStore> = match state_file {
        Some(path) => Arc::new(
            SnapshotStore::open(&path)
                .wrap_err_with(|| format!("Failed to open state file {:?}", path))?,
        ),
        None => {
            info!("No state file configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = PoolRegistry::open(store, config.registry_settings())?;
    bootstrap_pools(&registry, config)?;
    Ok(registry)
}

/// Create the pools declared in `config` that do not exist yet.
///
/// A pool that already exists under the same name is left as it is, even if
/// its declaration has changed. Returns the number of pools created.
pub fn bootstrap_pools(registry: &PoolRegistry, config: &Config) -> Result<usize> {
    let mut created = 0;
    for spec in &config.pools {
        match registry.create_pool(spec) {
            Ok(summary) => {
                info!("Created declared pool '{}'", summary.name);
                created += 1;
            }
            Err(PoolError::Conflict(name)) => {
                warn!("Pool '{}' already exists, keeping the existing pool", name);
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("Invalid pool '{}'", spec.name()));
            }
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::AllocationRequest;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const POOLS_YAML: &str = r#"
general:
  log_level: debug
  enumeration_limit: 16
pools:
  - type: ipv4
    name: mgmt
    cidr: 10.100.0.0/24
  - type: rt
    name: cust-rt
    format_type: 0
    admin_value: "65000"
    range_start: 1000
    range_end: 1999
"#;

    #[test]
    fn test_load_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", POOLS_YAML).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.pools.len(), 2);
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "general:\n  enumeration_limit: 0\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());

        assert!(load_config(Path::new("/nonexistent/netpool.yaml")).is_err());
    }

    #[test]
    fn test_open_registry_bootstraps_pools() {
        let config: Config = serde_yaml::from_str(POOLS_YAML).unwrap();
        let registry = open_registry(&config, None).unwrap();

        assert_eq!(registry.pools().len(), 2);
        assert_eq!(registry.settings().enumeration_limit, 16);
    }

    #[test]
    fn test_existing_pools_are_kept() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("pools.state");
        let config: Config = serde_yaml::from_str(POOLS_YAML).unwrap();

        {
            let registry = open_registry(&config, Some(&state)).unwrap();
            registry
                .allocate("mgmt", AllocationRequest::block(30))
                .unwrap();
        }

        let registry = open_registry(&config, Some(&state)).unwrap();
        assert_eq!(registry.pool("mgmt").unwrap().allocated, 4);
        assert_eq!(bootstrap_pools(&registry, &config).unwrap(), 0);
    }

    #[test]
    fn test_bootstrap_reports_invalid_pool() {
        let yaml = r#"
pools:
  - type: ipv4
    name: broken
    cidr: 2001:db8::/64
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let registry = PoolRegistry::in_memory();
        assert!(bootstrap_pools(&registry, &config).is_err());
    }
}
