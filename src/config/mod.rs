//! Configuration management for warmvol

pub mod imds;
pub mod job;
pub mod schema;

pub use job::{JobContext, RunnerConfig};
pub use schema::Config;

use crate::error::{WarmvolError, WarmvolResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warmvol")
            .join("config.toml")
    }

    /// Get the default state directory path
    pub fn default_state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warmvol")
    }

    /// State directory for `config`, falling back to the default
    pub fn state_dir(config: &Config) -> PathBuf {
        config
            .general
            .state_dir
            .clone()
            .unwrap_or_else(Self::default_state_dir)
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> WarmvolResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> WarmvolResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| WarmvolError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| WarmvolError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> WarmvolResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            WarmvolError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> WarmvolResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| WarmvolError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.volume.device, "/dev/sdf");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.snapshot.wait_for_completion = true;
        config.aws.region = Some("eu-central-1".to_string());

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert!(loaded.snapshot.wait_for_completion);
        assert_eq!(loaded.aws.region.as_deref(), Some("eu-central-1"));
    }

    #[tokio::test]
    async fn invalid_file_is_config_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[volume]\nsize_gib = \"big\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, WarmvolError::ConfigInvalid { .. }));
    }

    #[test]
    fn state_dir_override() {
        let mut config = Config::default();
        assert!(ConfigManager::state_dir(&config).ends_with("warmvol"));

        config.general.state_dir = Some(PathBuf::from("/run/warmvol"));
        assert_eq!(
            ConfigManager::state_dir(&config),
            PathBuf::from("/run/warmvol")
        );
    }
}
