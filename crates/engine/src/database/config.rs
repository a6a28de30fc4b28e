//! Store configuration via `docshell.toml`
//!
//! On first open a default `docshell.toml` is written into the home
//! directory. Edit the file to change settings; command-line flags override
//! individual values for a single run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use docshell_core::{Error, Result};

/// Config file name placed in the home directory.
pub const CONFIG_FILE_NAME: &str = "docshell.toml";

/// Store configuration loaded from `docshell.toml`.
///
/// # Example
///
/// ```toml
/// cache_size_mb = 64
/// sync_on_close = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Cache size in megabytes.
    #[serde(default = "default_cache_size_mb")]
    pub cache_size_mb: u64,
    /// Write named containers to disk when their last handle closes.
    #[serde(default = "default_sync_on_close")]
    pub sync_on_close: bool,
}

fn default_cache_size_mb() -> u64 {
    64
}

fn default_sync_on_close() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: default_cache_size_mb(),
            sync_on_close: default_sync_on_close(),
        }
    }
}

impl StoreConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docshell store configuration
#
# Cache size in megabytes (default: 64).
# The --size flag overrides this for a single run.
cache_size_mb = 64

# Write named containers to disk when their last handle is closed
# (default: true). When false, only the sync command persists them.
sync_on_close = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the cache
    /// size is zero.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| Error::InvalidInput {
            reason: format!("failed to parse config file '{}': {}", path.display(), e),
        })?;
        if config.cache_size_mb == 0 {
            return Err(Error::InvalidInput {
                reason: format!(
                    "cache_size_mb in '{}' must be greater than zero",
                    path.display()
                ),
            });
        }
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::Io {
                reason: format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Serialization {
            reason: format!("failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| Error::Io {
            reason: format!("failed to write config file '{}': {}", path.display(), e),
        })
    }

    /// Load `docshell.toml` from `home`, creating it with defaults first when
    /// missing.
    pub fn load_or_create(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_size_mb, 64);
        assert!(config.sync_on_close);
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: StoreConfig = toml::from_str(StoreConfig::default_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config: StoreConfig = toml::from_str("sync_on_close = false").unwrap();
        assert_eq!(config.cache_size_mb, 64);
        assert!(!config.sync_on_close);
    }

    #[test]
    fn zero_cache_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "cache_size_mb = 0\n").unwrap();
        assert!(StoreConfig::from_file(&path).is_err());
    }

    #[test]
    fn load_or_create_writes_default() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "cache_size_mb = 128\n").unwrap();
        StoreConfig::write_default_if_missing(&path).unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.cache_size_mb, 128);
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = StoreConfig {
            cache_size_mb: 256,
            sync_on_close: false,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }
}
