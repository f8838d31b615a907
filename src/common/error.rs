use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout_secs}s waiting for selector '{selector}' on {url}")]
    SelectorTimeout {
        selector: String,
        url: String,
        timeout_secs: u64,
    },

    #[error("Browser pool is closed")]
    BrowserClosed,

    #[error("Scraping failed for {scraper}: {message}")]
    Scraping { scraper: String, message: String },

    #[error("Scraper not found: {0}")]
    ScraperNotFound(String),

    #[error("LLM API error (status {status}): {message}")]
    LlmApi { status: u16, message: String },

    #[error("LLM returned no content")]
    LlmEmptyResponse,

    #[error("LLM returned malformed JSON: {0}")]
    LlmMalformed(String),

    #[error("Collaborator {service} failed: {message}")]
    Collaborator { service: String, message: String },
}

impl IngestError {
    pub fn scraping(scraper: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::Scraping {
            scraper: scraper.into(),
            message: message.into(),
        }
    }

    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
