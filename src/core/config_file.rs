//! User configuration file handling
//!
//! Manages settings from ~/.config/bezy/backend.json

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::designspace::BackendOptions;

const CONFIG_FILE_NAME: &str = "backend.json";

/// User configuration from ~/.config/bezy/backend.json
///
/// These settings override built-in defaults but are overridden by CLI arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Quiet period before a batch of file events is handled
    pub debounce_ms: u64,
    /// Pause before re-reading glyph listings after files were added or removed
    pub settle_delay_ms: u64,
    /// Log level filter, e.g. "info" or "bezy_backend=debug"
    pub log_level: String,
    /// Also write logs to ~/.config/bezy/logs/
    pub log_to_file: bool,
    /// Mark every written glyph with `public.truetype.overlap`
    pub set_overlap_simple_flag: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            settle_delay_ms: 150,
            log_level: "info".to_string(),
            log_to_file: false,
            set_overlap_simple_flag: false,
        }
    }
}

impl ConfigFile {
    /// Get the path to the bezy config directory
    pub fn config_dir() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
        config_dir.join("bezy")
    }

    /// Get the path to the user config file
    pub fn config_path() -> PathBuf {
        Self::config_dir().join(CONFIG_FILE_NAME)
    }

    /// Load configuration from the user config file
    pub fn load() -> Option<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return None;
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!("Loaded backend settings from {:?}", path);
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", CONFIG_FILE_NAME, e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}", CONFIG_FILE_NAME, e);
                None
            }
        }
    }

    /// The config file's settings, or the defaults when there is none.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Create ~/.config/bezy with a default backend.json and a logs directory.
    pub fn initialize_config_directory() -> anyhow::Result<()> {
        let config_dir = Self::config_dir();
        fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {:?}", config_dir);

        let logs_dir = crate::logging::logs_dir();
        fs::create_dir_all(&logs_dir)?;
        println!("Created logs directory: {:?}", logs_dir);

        let settings_path = Self::config_path();
        if !settings_path.exists() {
            Self::default().save()?;
            println!("Created settings file: {:?}", settings_path);
        } else {
            println!("Settings file already exists: {:?}", settings_path);
        }

        println!("\nConfiguration initialized successfully!");
        println!("  - Edit settings at: {:?}", settings_path);
        println!("  - View backend logs in: {:?}", logs_dir);
        Ok(())
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            set_overlap_simple_flag: self.set_overlap_simple_flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: ConfigFile = serde_json::from_str(r#"{"debounce_ms": 250}"#).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.settle_delay_ms, 150);
        assert_eq!(config.log_level, "info");

        let options = config.backend_options();
        assert_eq!(options.debounce, Duration::from_millis(250));
        assert!(!options.set_overlap_simple_flag);
    }
}
