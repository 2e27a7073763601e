//! Configuration management module for the dispatch engine.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Main config file (`config/autorail.toml`)
//! 3. Explicit config file passed by the caller
//! 4. Environment variables (highest priority)

mod autopilot;
mod station;
pub use autopilot::*;
pub use station::*;

//---
use std::env;
use std::path::PathBuf;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Dispatch engine core parameters
    #[serde(default)]
    pub autopilot: AutopilotConfig,
    /// Command station attachment parameters
    #[serde(default)]
    pub station: StationConfig,
    /// Log output settings
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autopilot: AutopilotConfig::default(),
            station: StationConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    /// Directory the binary writes its rolling log files into
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Main config file (optional)
    /// 2. Explicit config file
    /// 3. `CONFIG_PATH` environment override
    /// 4. Environment variables
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a layout-specific configuration
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        // 1. Main config
        config = config.add_source(File::with_name("config/autorail").required(false));

        // 2. Overwrite with the caller's config
        if let Some(custom) = config_path {
            config = config.add_source(File::with_name(custom).required(true));
        }

        // 3. Environment overlay
        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path));
        }

        // 4. Environment variables (highest priority)
        config = config.add_source(
            Environment::with_prefix("AUTORAIL")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.autopilot.validate()?;
        self.station.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod config_test;
