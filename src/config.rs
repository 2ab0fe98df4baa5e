//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.jobforecast.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".jobforecast.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Prediction form defaults and limits.
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Directory that exported documents are written to.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            export_dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("outputs")
}

/// Forecast API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. Monte Carlo batches can be slow.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Prediction defaults and the accepted target year window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_target_year")]
    pub target_year: i32,

    #[serde(default = "default_simulations")]
    pub n_simulations: u32,

    #[serde(default = "default_confidence")]
    pub confidence_level: f64,

    /// Earliest accepted target year (inclusive).
    #[serde(default = "default_min_target_year")]
    pub min_target_year: i32,

    /// Latest accepted target year (inclusive).
    #[serde(default = "default_max_target_year")]
    pub max_target_year: i32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            target_year: default_target_year(),
            n_simulations: default_simulations(),
            confidence_level: default_confidence(),
            min_target_year: default_min_target_year(),
            max_target_year: default_max_target_year(),
        }
    }
}

fn default_target_year() -> i32 {
    2030
}

fn default_simulations() -> u32 {
    5000
}

fn default_confidence() -> f64 {
    0.95
}

fn default_min_target_year() -> i32 {
    2024
}

fn default_max_target_year() -> i32 {
    2040
}

/// Notification banner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Seconds before a notification expires on its own.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_url) = args.api_url {
            self.api.base_url = api_url.clone();
        }

        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref export_dir) = args.export_dir {
            self.general.export_dir = export_dir.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
