use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const API_URL_ENV: &str = "PDF_CHAT_API_URL";

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_chat_switch_delay_ms() -> u64 {
    800
}

fn default_progress_tick_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_file_size_bytes: u64,
    pub max_message_chars: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct UiConfig {
    pub toast_duration_ms: u64,
    #[serde(default = "default_chat_switch_delay_ms")]
    pub chat_switch_delay_ms: u64,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_message_chars: 2000,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            toast_duration_ms: 5000,
            chat_switch_delay_ms: default_chat_switch_delay_ms(),
            progress_tick_ms: default_progress_tick_ms(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                connect_timeout_secs: default_connect_timeout_secs(),
            },
            limits: LimitsConfig::default(),
            ui: UiConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match Self::from_path(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), "{e:#}. Using defaults.");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend.base_url = url;
            }
        }

        config
    }

    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Error reading config.toml: {e}"))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow::anyhow!("Error parsing config.toml: {e}"))
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/pdf-chat")
        } else {
            PathBuf::from(".")
        }
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.ui.toast_duration_ms)
    }

    pub fn chat_switch_delay(&self) -> Duration {
        Duration::from_millis(self.ui.chat_switch_delay_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.ui.progress_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.limits.max_file_size_bytes, 10_485_760);
        assert_eq!(config.limits.max_message_chars, 2000);
        assert_eq!(config.toast_duration(), Duration::from_millis(5000));
        assert_eq!(config.chat_switch_delay(), Duration::from_millis(800));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
            [backend]
            base_url = "https://docs.example.com/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "https://docs.example.com/api");
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.limits.max_message_chars, 2000);
        assert_eq!(config.window.width, 900);
    }

    #[test]
    fn test_parse_overrides_limits() {
        let config = Config::parse(
            r#"
            [backend]
            base_url = "http://127.0.0.1:9000"

            [limits]
            max_file_size_bytes = 1024
            max_message_chars = 10

            [ui]
            toast_duration_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.limits.max_file_size_bytes, 1024);
        assert_eq!(config.limits.max_message_chars, 10);
        assert_eq!(config.ui.toast_duration_ms, 100);
        assert_eq!(config.ui.progress_tick_ms, 200);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Config::parse("[backend]\nbase_url = 42").unwrap_err();
        assert!(err.to_string().contains("Error parsing config.toml"));
    }
}
