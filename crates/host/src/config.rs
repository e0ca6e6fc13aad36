use std::fs;
use std::path::{Path, PathBuf};

use push2_surface::config::PREFERENCES_VERSION;
use push2_surface::Preferences;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loads and saves the surface preferences.
/// Stored in push2.json in the working directory unless a path is given.
pub struct ConfigManager {
    config_path: PathBuf,
    preferences: Preferences,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub preferences: Preferences,
    pub created_at: String,
    pub modified_at: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Config file version {0} is newer than this build supports")]
    UnsupportedVersion(u32),
    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from("push2.json")),
            preferences: Preferences::default(),
        }
    }

    /// Load preferences, writing a default file first if none exists.
    pub fn load(&mut self) -> Result<Preferences, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.preferences.clone());
        }

        let content = fs::read_to_string(&self.config_path).map_err(ConfigError::Read)?;
        let config_file: ConfigFile = serde_json::from_str(&content).map_err(ConfigError::Parse)?;

        if config_file.version > PREFERENCES_VERSION {
            return Err(ConfigError::UnsupportedVersion(config_file.version));
        }
        config_file
            .preferences
            .validate()
            .map_err(ConfigError::Validation)?;

        self.preferences = config_file.preferences;
        Ok(self.preferences.clone())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(ConfigError::Write)?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.created_at().unwrap_or_else(|| now.clone());
        let config_file = ConfigFile {
            version: PREFERENCES_VERSION,
            preferences: self.preferences.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file).map_err(ConfigError::Serialize)?;
        fs::write(&self.config_path, content).map_err(ConfigError::Write)?;
        log::debug!("Saved preferences to {}", self.config_path.display());
        Ok(())
    }

    /// Update preferences and save to file.
    pub fn update_preferences(&mut self, preferences: Preferences) -> Result<(), ConfigError> {
        preferences.validate().map_err(ConfigError::Validation)?;
        self.preferences = preferences;
        self.save()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        serde_json::from_str::<ConfigFile>(&content)
            .ok()
            .map(|file| file.created_at)
    }
}
