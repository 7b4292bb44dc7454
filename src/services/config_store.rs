// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to route both remote calls through, if enabled.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https
            .as_deref()
            .or(self.http.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,
    #[serde(default = "default_specialist_model")]
    pub specialist_model: String,
    /// Specialist probability above which an uncertain reasoning verdict is overridden.
    #[serde(default = "default_override_threshold")]
    pub override_threshold: f64,
    #[serde(default = "default_override_floor")]
    pub override_probability_floor: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            reasoning_model: default_reasoning_model(),
            specialist_model: default_specialist_model(),
            override_threshold: default_override_threshold(),
            override_probability_floor: default_override_floor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub base_url: Option<String>,
}

fn default_reasoning_model() -> String { "gemini-2.5-flash".to_string() }
fn default_specialist_model() -> String { "umm-maybe/AI-image-detector".to_string() }
fn default_override_threshold() -> f64 { 0.98 }
fn default_override_floor() -> f64 { 95.0 }

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
        dirs::config_dir().map(|p| p.join("veritas"))
    }

    /// Store rooted at the platform config directory, if one exists.
    pub fn open_default() -> Option<Self> {
        Self::default_config_dir().map(Self::new)
    }

    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err(&backup_file))?;

        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err(backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.reasoning_model, "gemini-2.5-flash");
        assert_eq!(config.detection.override_threshold, 0.98);
        assert_eq!(config.detection.override_probability_floor, 95.0);
    }

    #[test]
    fn test_partial_detection_section_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"detection": {"reasoningModel": "gemini-2.5-pro"}}"#).unwrap();
        assert_eq!(parsed.detection.reasoning_model, "gemini-2.5-pro");
        assert_eq!(parsed.detection.specialist_model, "umm-maybe/AI-image-detector");
        assert!(parsed.api_keys.is_empty());
    }

    #[test]
    fn test_proxy_active_url() {
        let proxy = ProxyConfig {
            enabled: true,
            http: Some("http://127.0.0.1:8080".to_string()),
            https: None,
        };
        assert_eq!(proxy.active_url(), Some("http://127.0.0.1:8080"));

        let disabled = ProxyConfig { enabled: false, ..proxy };
        assert_eq!(disabled.active_url(), None);
    }

    #[test]
    fn test_store_round_trip_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("veritas"));

        let mut config = store.load().unwrap();
        assert!(config.api_keys.is_empty());
        config.api_keys.insert("gemini".to_string(), "key-123".to_string());
        config.providers.insert(
            "huggingface".to_string(),
            ProviderConfig {
                base_url: Some("http://localhost:9000".to_string()),
            },
        );
        store.save(&config).unwrap();
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.api_keys.get("gemini").map(String::as_str), Some("key-123"));
        assert_eq!(
            loaded.providers["huggingface"].base_url.as_deref(),
            Some("http://localhost:9000")
        );

        let backups = fs::read_dir(dir.path().join("veritas").join("backups"))
            .unwrap()
            .count();
        assert!(backups >= 1);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "not json").unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }
}
