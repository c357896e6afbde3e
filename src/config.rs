use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Client configuration, persisted as JSON in the user's home directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    /// Base URL of the analysis service (e.g. "http://127.0.0.1:5000")
    pub server_url: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole request; analysis can take a while on CPU
    pub request_timeout_secs: u64,

    // Reveal and animation timing
    pub report_reveal_interval_ms: u64,
    pub history_reveal_interval_ms: u64,
    pub finding_stagger_ms: u64,
    pub bar_delay_ms: u64,

    /// Sent when the patient name field is left blank
    pub default_patient_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            server_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
            report_reveal_interval_ms: 10,
            history_reveal_interval_ms: 1,
            finding_stagger_ms: 100,
            bar_delay_ms: 100,
            default_patient_name: "Anonymous".to_string(),
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".xray-report-client"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location or return default
    pub fn load_or_default() -> Self {
        match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from a file; a missing file yields the default
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn report_reveal_interval(&self) -> Duration {
        Duration::from_millis(self.report_reveal_interval_ms)
    }

    pub fn history_reveal_interval(&self) -> Duration {
        Duration::from_millis(self.history_reveal_interval_ms)
    }

    pub fn finding_stagger(&self) -> Duration {
        Duration::from_millis(self.finding_stagger_ms)
    }

    pub fn bar_delay(&self) -> Duration {
        Duration::from_millis(self.bar_delay_ms)
    }
}
