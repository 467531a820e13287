use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::UserRole;

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "HR_CHAT_API_URL";

/// Backend used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the HR assistant backend
    pub api_base_url: String,

    /// Role sent with every query unless overridden
    pub default_role: UserRole,

    /// Upper bound on a single backend request
    pub request_timeout_secs: u64,

    /// Where sessions and message histories are stored
    pub data_dir: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_confidence: bool,
    pub show_sources: bool,

    /// Starter questions offered on an empty chat
    pub suggestions: Vec<String>,
}

const DEFAULT_SUGGESTIONS: &[&str] = &[
    "What is the company match for the 401(k) retirement plan?",
    "How many weeks of fully paid leave is a primary caregiver entitled to for parental leave?",
    "In what year was NovaCorp founded?",
    "What is the standard duration of a Performance Improvement Plan (PIP)?",
    "What is the code name for the active $200M SaaS acquisition project?",
    "How long is the consideration period for a release agreement under the ADEA for a group termination?",
    "By what date must managers complete their team's annual performance reviews?",
];

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_confidence: true,
            show_sources: true,
            suggestions: DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_URL.to_string(),
            default_role: UserRole::Employee,
            request_timeout_secs: 60,
            data_dir: Self::home_dir().join("data"),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// `~/.hr-chat`
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hr-chat")
    }

    /// Load `~/.hr-chat/config.toml`, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::home_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    /// Load a specific config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        config.api_base_url = normalize_base_url(&config.api_base_url);
        Ok(config)
    }

    /// Apply the `HR_CHAT_API_URL` value, if any
    pub fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|url| !url.trim().is_empty()) {
            self.set_api_base_url(&url);
        }
    }

    pub fn set_api_base_url(&mut self, url: &str) {
        self.api_base_url = normalize_base_url(url);
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Endpoint receiving queries
    pub fn workflow_url(&self) -> String {
        format!("{}/api/workflow", self.api_base_url)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("hr-chat.log")
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.default_role, UserRole::Employee);
        assert_eq!(config.workflow_url(), "http://localhost:8000/api/workflow");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_base_url = \"https://hr.example.com/\"\ndefault_role = \"manager\"\n\n[ui]\nshow_sources = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://hr.example.com");
        assert_eq!(config.default_role, UserRole::Manager);
        assert_eq!(config.request_timeout_secs, 60);
        assert!(!config.ui.show_sources);
        assert!(config.ui.show_confidence);
        assert_eq!(config.ui.suggestions.len(), 7);
    }

    #[test]
    fn suggestions_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ui]\nsuggestions = [\"Where is the handbook?\"]\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ui.suggestions, vec!["Where is the handbook?".to_string()]);
    }

    #[test]
    fn env_overrides_file_value() {
        let mut config = Config::default();
        config.apply_env(Some("http://backend:9000/".to_string()));
        assert_eq!(config.api_base_url, "http://backend:9000");

        config.apply_env(Some("   ".to_string()));
        assert_eq!(config.api_base_url, "http://backend:9000");

        config.apply_env(None);
        assert_eq!(config.api_base_url, "http://backend:9000");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base_url = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.default_role = UserRole::Hr;
        config.request_timeout_secs = 5;
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_role, UserRole::Hr);
        assert_eq!(loaded.request_timeout(), Duration::from_secs(5));
    }
}
