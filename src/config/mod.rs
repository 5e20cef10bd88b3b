//! Configuration module for managing Hermit's persisted settings.
//!
//! JSON-based (the original stores the same shape as a Python dict literal;
//! JSON is the closest serde target without inventing a schema), with
//! defaults, CLI override, and env var support, mirroring the teacher's
//! config layer shape.

use std::path::{Path, PathBuf};

use crate::models::HermitConfig;

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Config directory error: {0}")]
    DirectoryError(String),
}

/// Manages `~/.hermit/config.json`.
pub struct ConfigManager {
    config_path: PathBuf,
}

fn validate(config: &HermitConfig) -> Result<(), String> {
    if config.cgroups.cpu_quota_percent > 100 {
        return Err(format!(
            "cgroups.cpu_quota_percent must be <= 100, got {}",
            config.cgroups.cpu_quota_percent
        ));
    }
    if config.cgroups.timeout_seconds == 0 {
        return Err("cgroups.timeout_seconds must be greater than 0".to_string());
    }
    if config.safety.max_files_per_operation == 0 {
        return Err("safety.max_files_per_operation must be greater than 0".to_string());
    }
    for mount in &config.allowed_directories {
        if !mount.sandbox.starts_with('/') {
            return Err(format!(
                "allowed_directories sandbox path must be absolute: {}",
                mount.sandbox
            ));
        }
    }
    Ok(())
}

impl ConfigManager {
    /// Create a new ConfigManager at `~/.hermit/config.json`, creating the
    /// directory if it doesn't exist.
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::DirectoryError("could not determine home directory".to_string()))?;
        let config_dir = home.join(".hermit");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        Ok(Self {
            config_path: config_dir.join("config.json"),
        })
    }

    /// Create a ConfigManager with a custom config path, mainly for tests.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self { config_path })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_path_string(&self) -> String {
        self.config_path.to_string_lossy().to_string()
    }

    /// Load configuration from file, or return defaults if not found.
    pub fn load(&self) -> Result<HermitConfig, ConfigError> {
        if !self.config_path.exists() {
            return Ok(HermitConfig::default());
        }

        let contents = std::fs::read_to_string(&self.config_path)?;
        let config: HermitConfig = serde_json::from_str(&contents)?;
        validate(&config).map_err(ConfigError::ValidationError)?;

        Ok(config)
    }

    /// Validate then write `config` as pretty JSON.
    pub fn save(&self, config: &HermitConfig) -> Result<(), ConfigError> {
        validate(config).map_err(ConfigError::ValidationError)?;

        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, json)?;

        Ok(())
    }

    /// `HERMIT_SAFETY_LEVEL`, `HERMIT_MEMORY_MAX_MB`, `HERMIT_TIMEOUT_SECONDS`,
    /// `HERMIT_UNSAFE_CONFIRM_DELETE` override the loaded file, env taking
    /// precedence over whatever is on disk (never over an explicit CLI flag,
    /// which the caller applies after this).
    pub fn merge_with_env(&self) -> Result<HermitConfig, ConfigError> {
        let mut config = self.load()?;

        if let Ok(value) = std::env::var("HERMIT_REQUIRE_CONFIRMATION_FOR_DELETE") {
            config.safety.require_confirmation_for_delete =
                parse_bool(&value).map_err(ConfigError::ValidationError)?;
        }

        if let Ok(value) = std::env::var("HERMIT_MEMORY_MAX_MB") {
            config.cgroups.memory_max_mb = value
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("invalid memory limit: {value}")))?;
        }

        if let Ok(value) = std::env::var("HERMIT_TIMEOUT_SECONDS") {
            config.cgroups.timeout_seconds = value
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("invalid timeout: {value}")))?;
        }

        if let Ok(value) = std::env::var("HERMIT_MAX_FILES_PER_OPERATION") {
            config.safety.max_files_per_operation = value.parse().map_err(|_| {
                ConfigError::ValidationError(format!("invalid max files per operation: {value}"))
            })?;
        }

        Ok(config)
    }

    /// Add a new bind-mount directory and persist the change.
    pub fn add_directory(&self, host: String, sandbox: String) -> Result<HermitConfig, ConfigError> {
        let mut config = self.load()?;
        config.allowed_directories.push(crate::models::MountPair { host, sandbox });
        self.save(&config)?;
        Ok(config)
    }

    /// Remove a configured mount by its sandbox path and persist the change.
    pub fn remove_directory(&self, sandbox: &str) -> Result<HermitConfig, ConfigError> {
        let mut config = self.load()?;
        config.allowed_directories.retain(|m| m.sandbox != sandbox);
        self.save(&config)?;
        Ok(config)
    }

    /// Overwrite the config file with defaults.
    pub fn reset(&self) -> Result<HermitConfig, ConfigError> {
        let config = HermitConfig::default();
        self.save(&config)?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        assert!(ConfigManager::with_config_path(config_path).is_ok());
    }

    #[test]
    fn load_defaults_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.json");
        let manager = ConfigManager::with_config_path(config_path).unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config, HermitConfig::default());
    }

    #[test]
    fn save_and_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::with_config_path(config_path).unwrap();

        let mut config = HermitConfig::default();
        config.cgroups.memory_max_mb = 1024;
        config.safety.require_confirmation_for_delete = false;

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.cgroups.memory_max_mb, 1024);
        assert!(!loaded.safety.require_confirmation_for_delete);
    }

    #[test]
    fn save_rejects_invalid_cpu_quota() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_config_path(temp_dir.path().join("config.json")).unwrap();
        let mut config = HermitConfig::default();
        config.cgroups.cpu_quota_percent = 150;
        assert!(manager.save(&config).is_err());
    }

    #[test]
    fn add_and_remove_directory_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_config_path(temp_dir.path().join("config.json")).unwrap();
        manager.reset().unwrap();

        let config = manager
            .add_directory("~/Music".to_string(), "/workspace/music".to_string())
            .unwrap();
        assert!(config
            .allowed_directories
            .iter()
            .any(|m| m.sandbox == "/workspace/music"));

        let config = manager.remove_directory("/workspace/music").unwrap();
        assert!(!config
            .allowed_directories
            .iter()
            .any(|m| m.sandbox == "/workspace/music"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
