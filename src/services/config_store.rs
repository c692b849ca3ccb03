// Configuration Storage Service
// Persists dashboard settings and the service endpoint, with versioned backups

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::detection_client::{resolve_base_url, ClientOptions, DEFAULT_TIMEOUT_SECS};

const MAX_BACKUPS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("detection threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),
    #[error("max batch size must be at least 1")]
    InvalidBatchSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub service: ServiceConfig,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub settings: DashboardSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            service: ServiceConfig::default(),
            proxy: None,
            settings: DashboardSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Operator preferences edited on the settings page.
///
/// `api_key` is stored but not attached to detection requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    #[serde(default = "default_threshold")]
    pub detection_threshold: f64,
    #[serde(default = "default_true")]
    pub enable_notifications: bool,
    #[serde(default)]
    pub enable_email_alerts: bool,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_batch_size")]
    pub max_batch_size: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            detection_threshold: 0.5,
            enable_notifications: true,
            enable_email_alerts: false,
            email_address: String::new(),
            api_key: None,
            max_batch_size: 100,
        }
    }
}

impl DashboardSettings {
    pub fn set_detection_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        self.detection_threshold = threshold;
        Ok(())
    }

    pub fn set_max_batch_size(&mut self, size: u32) -> Result<(), ConfigError> {
        if size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        self.max_batch_size = size;
        Ok(())
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }
fn default_threshold() -> f64 { 0.5 }
fn default_true() -> bool { true }
fn default_batch_size() -> u32 { 100 }

impl AppConfig {
    /// Client options derived from the stored service section and proxy.
    pub fn client_options(&self) -> ClientOptions {
        let proxy = self
            .proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.https.clone().or_else(|| p.http.clone()));

        ClientOptions {
            base_url: resolve_base_url(self.service.base_url.as_deref()),
            timeout: Duration::from_secs(self.service.timeout_secs.max(1)),
            proxy,
        }
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("toxiscope"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration, backing up the previous file first
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        fs::copy(&self.config_file, &backup_file)?;

        self.cleanup_old_backups(&backup_dir, MAX_BACKUPS)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Timestamped names sort oldest first
        entries.sort_by_key(|e| e.file_name());

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), ConfigError>,
    {
        let mut config = self.load()?;
        apply(&mut config)?;
        self.save(&config)?;
        Ok(config)
    }

    pub fn get_api_key(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.load()?.settings.api_key)
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), ConfigError> {
        self.update(|c| {
            c.settings.api_key = Some(key.trim().to_string());
            Ok(())
        })
        .map(|_| ())
    }

    pub fn delete_api_key(&self) -> Result<(), ConfigError> {
        self.update(|c| {
            c.settings.api_key = None;
            Ok(())
        })
        .map(|_| ())
    }

    pub fn get_service_url(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.load()?.service.base_url)
    }

    pub fn set_service_url(&self, url: &str) -> Result<(), ConfigError> {
        let url = url.trim().trim_end_matches('/').to_string();
        self.update(|c| {
            c.service.base_url = Some(url);
            Ok(())
        })
        .map(|_| ())
    }

    pub fn set_detection_threshold(&self, threshold: f64) -> Result<AppConfig, ConfigError> {
        self.update(|c| c.settings.set_detection_threshold(threshold))
    }
}
