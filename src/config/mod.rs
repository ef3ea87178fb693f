//! Configuration system (layered: code > env > config file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ThreadRunError};

const DEFAULT_TITLE_MAX_CHARS: usize = 50;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Optional capability tools offered to the assistant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    pub web_search: bool,
    pub image_generation: bool,
}

/// Engine configuration.
///
/// Resolution order: values set in code, then `THREADRUN_*` environment
/// variables (a `.env` file is honoured), then
/// `<config dir>/threadrun/config.toml`.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    #[builder(into)]
    pub base_url: Option<String>,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(into)]
    pub assistant_id: Option<String>,
    #[builder(default = DEFAULT_TITLE_MAX_CHARS)]
    pub title_max_chars: usize,
    #[builder(default)]
    pub features: FeatureFlags,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            assistant_id: None,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            features: FeatureFlags::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Load from the default config file (if any) overlaid with the environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Build purely from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| ThreadRunError::Configuration(format!("invalid config file: {e}")))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// `<config dir>/threadrun/config.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "threadrun")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay `THREADRUN_*` variables onto this config.
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        if let Ok(url) = std::env::var("THREADRUN_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("THREADRUN_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(id) = std::env::var("THREADRUN_ASSISTANT_ID") {
            self.assistant_id = Some(id);
        }
        if let Some(n) = env_parse::<usize>("THREADRUN_TITLE_MAX_CHARS") {
            self.title_max_chars = n;
        }
        if let Some(flag) = env_flag("THREADRUN_FEATURE_WEB_SEARCH") {
            self.features.web_search = flag;
        }
        if let Some(flag) = env_flag("THREADRUN_FEATURE_IMAGE_GENERATION") {
            self.features.image_generation = flag;
        }
    }

    /// Base URL without a trailing slash, or a configuration error.
    pub fn require_base_url(&self) -> Result<String> {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ThreadRunError::Configuration(
                    "missing base URL (set THREADRUN_BASE_URL or base_url in config.toml)".into(),
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
