use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONSUMER_KEY_ENV: &str = "SWIPETUI_CONSUMER_KEY";
pub const CONSUMER_SECRET_ENV: &str = "SWIPETUI_CONSUMER_SECRET";

const APP_DIR: &str = "swipetui";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub twitter: TwitterConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub api_host: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_host: "api.twitter.com".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
    pub image_cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            image_cache_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    pub status_timeout_ms: u64,
    pub fetch_on_start: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: 3000,
            fetch_on_start: true,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Reads the config file if it exists, then applies env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(CONSUMER_KEY_ENV) {
            self.twitter.consumer_key = key;
        }
        if let Ok(secret) = std::env::var(CONSUMER_SECRET_ENV) {
            self.twitter.consumer_secret = secret;
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn image_cache_dir(&self) -> PathBuf {
        self.data_dir().join("images")
    }

    pub fn has_consumer_keys(&self) -> bool {
        !self.twitter.consumer_key.is_empty() && !self.twitter.consumer_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.twitter.api_host, "api.twitter.com");
        assert_eq!(config.storage.image_cache_capacity, 256);
        assert_eq!(config.ui.status_timeout_ms, 3000);
        assert!(config.ui.fetch_on_start);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[twitter]
api_host = "localhost:8080"

[storage]
data_dir = "/tmp/swipe"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.twitter.api_host, "localhost:8080");
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/swipe"));
        assert_eq!(config.image_cache_dir(), PathBuf::from("/tmp/swipe/images"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.storage.image_cache_capacity, 256);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[twitter\napi_host = 1").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
