use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::common::constants::{
    DEFAULT_CATEGORY_ID, DEFAULT_USER_AGENT, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
    MISTRAL_DEFAULT_BASE_URL, MISTRAL_DEFAULT_MODEL,
};
use crate::common::error::{IngestError, Result};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserSettings,
    pub mistral: MistralSettings,
    /// Per-scraper overrides keyed by scraper name (`event_finder`, `curt`, ...)
    pub scrapers: HashMap<String, ScraperOverrides>,
    pub import: ImportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub is_mobile: bool,
    pub javascript_enabled: bool,
    pub navigation_timeout_secs: u64,
    pub selector_timeout_secs: u64,
    pub max_concurrent_pages: usize,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            is_mobile: true,
            javascript_enabled: true,
            navigation_timeout_secs: 30,
            selector_timeout_secs: 10,
            max_concurrent_pages: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MistralSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_input_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for MistralSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: MISTRAL_DEFAULT_MODEL.to_string(),
            base_url: MISTRAL_DEFAULT_BASE_URL.to_string(),
            max_input_chars: 100_000,
            request_timeout_secs: 60,
        }
    }
}

/// Partial scraper configuration; unset fields keep the scraper's built-in value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScraperOverrides {
    pub base_url: Option<String>,
    pub date_format: Option<String>,
    pub pagination_pattern: Option<String>,
    pub max_pages: Option<u32>,
    pub max_results: Option<usize>,
    pub query_params: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub default_category_id: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            default_category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `config.toml` (or the given path) and applies environment overrides.
    ///
    /// A missing default file yields the built-in defaults; a missing explicit
    /// path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            if !key.trim().is_empty() {
                self.mistral.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("MISTRAL_MODEL") {
            if !model.trim().is_empty() {
                self.mistral.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("MISTRAL_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.mistral.base_url = base_url;
            }
        }
    }

    pub fn scraper_overrides(&self, scraper_name: &str) -> Option<&ScraperOverrides> {
        self.scrapers.get(scraper_name)
    }
}
