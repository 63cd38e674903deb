use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// Seconds before an unanswered request fails; 0 waits forever.
    pub request_timeout_secs: u64,
    pub typing_interval_ms: u64,
    pub suggestions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 60,
            typing_interval_ms: 75,
            suggestions: vec![
                "Help me plan a game night with my 5 best friends for under $100.".to_string(),
                "What are the best tips to improve my public speaking skills?".to_string(),
                "Can you help me find the latest news on web development?".to_string(),
                "Write JavaScript code to sum all elements in an array.".to_string(),
            ],
        }
    }

    /// Load the config file. A missing file gives defaults; an unreadable one
    /// is logged and also gives defaults. `GEMINI_API_KEY` wins over the key
    /// stored in the file either way.
    pub fn load_or_default() -> Self {
        let env_key = std::env::var(API_KEY_ENV).ok();
        match Self::get_config_path() {
            Ok(path) => Self::load_or_default_from(&path, env_key),
            Err(e) => {
                warn!(error = %e, "no config directory, using defaults");
                Self::new().with_env_key(env_key)
            }
        }
    }

    pub fn load_or_default_from(path: &Path, env_key: Option<String>) -> Self {
        let config = Self::load_from(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "could not read config file, using defaults");
            Self::new()
        });
        config.with_env_key(env_key)
    }

    fn with_env_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Persist a key entered in the UI without touching other settings.
    pub fn save_api_key(key: &str) -> Result<()> {
        Self::save_api_key_to(&Self::get_config_path()?, key)
    }

    /// A config file that cannot be parsed is left alone rather than
    /// replaced with defaults.
    pub fn save_api_key_to(path: &Path, key: &str) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.api_key = Some(key.to_string());
        config.save_to(path)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("gemini-chat").join("config.json"))
    }

    /// Directory holding the chat database and the log file.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("gemini-chat"))
    }
}
