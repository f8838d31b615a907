use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::common::error::{IngestError, Result};
use crate::config::BrowserSettings;

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub is_mobile: bool,
}

/// Per-page emulation settings applied when a tab is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSettings {
    pub user_agent: String,
    pub viewport: Viewport,
    pub javascript_enabled: bool,
}

impl PageSettings {
    pub fn from_browser_settings(settings: &BrowserSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            viewport: Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                is_mobile: settings.is_mobile,
            },
            javascript_enabled: settings.javascript_enabled,
        }
    }
}

/// Starts a browser process; called at most once per launch cycle of a pool.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>>;
}

/// A running browser that can open independent tabs
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_tab(&self, settings: &PageSettings) -> Result<Box<dyn BrowserTab>>;

    async fn shutdown(&self) -> Result<()>;
}

/// A single tab. Never shared between concurrent callers.
#[async_trait]
pub trait BrowserTab: Send {
    async fn goto(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()>;

    /// Serialized DOM of the current document
    async fn content(&mut self) -> Result<String>;

    /// Clicks the first element matching `selector`; `false` when nothing was clicked.
    async fn click(&mut self, selector: &str) -> Result<bool>;

    fn current_url(&self) -> Option<&str>;

    async fn close(&mut self) -> Result<()>;
}

/// Launches an HTTP-backed browser: documents are fetched with the page's
/// user agent and viewport hints and served as static DOM.
pub struct HttpLauncher;

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| IngestError::BrowserLaunch(e.to_string()))?;
        info!("HTTP browser launched");
        Ok(Arc::new(HttpBrowser {
            client,
            shut_down: Arc::new(AtomicBool::new(false)),
        }))
    }
}

pub struct HttpBrowser {
    client: reqwest::Client,
    shut_down: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserEngine for HttpBrowser {
    async fn new_tab(&self, settings: &PageSettings) -> Result<Box<dyn BrowserTab>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(IngestError::BrowserClosed);
        }
        Ok(Box::new(HttpTab {
            client: self.client.clone(),
            settings: settings.clone(),
            browser_shut_down: self.shut_down.clone(),
            url: None,
            html: None,
            closed: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        info!("HTTP browser shut down");
        Ok(())
    }
}

struct HttpTab {
    client: reqwest::Client,
    settings: PageSettings,
    browser_shut_down: Arc<AtomicBool>,
    url: Option<String>,
    html: Option<String>,
    closed: bool,
}

impl HttpTab {
    fn ensure_open(&self) -> Result<()> {
        if self.closed || self.browser_shut_down.load(Ordering::SeqCst) {
            return Err(IngestError::BrowserClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserTab for HttpTab {
    async fn goto(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        debug!(url, ?wait, "HTTP tab navigating");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.settings.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "de-DE,de;q=0.9,en;q=0.5")
            .header("Viewport-Width", self.settings.viewport.width.to_string())
            .header(
                "Sec-CH-UA-Mobile",
                if self.settings.viewport.is_mobile { "?1" } else { "?0" },
            )
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| IngestError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Navigation {
                url: url.to_string(),
                message: format!("HTTP status {}", status),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| IngestError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        debug!(url = %final_url, bytes = body.len(), "HTTP tab loaded document");

        self.url = Some(final_url);
        self.html = Some(body);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.html.clone().unwrap_or_default())
    }

    async fn click(&mut self, selector: &str) -> Result<bool> {
        self.ensure_open()?;
        let html = self.html.as_deref().unwrap_or_default();
        if super::document_matches(html, selector)? {
            // Static documents cannot dispatch events
            debug!(selector, "HTTP tab ignores click on static document");
        }
        Ok(false)
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.html = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_tab_loads_document_and_never_clicks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programm"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><button id="cookie-accept">OK</button><div class="programm"></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let browser = HttpLauncher.launch().await.unwrap();
        let mut tab = browser
            .new_tab(&PageSettings::from_browser_settings(&BrowserSettings::default()))
            .await
            .unwrap();
        let url = format!("{}/programm", server.uri());
        tab.goto(&url, WaitUntil::NetworkIdle, Duration::from_secs(5)).await.unwrap();

        assert!(tab.content().await.unwrap().contains("cookie-accept"));
        assert!(!tab.click("#cookie-accept").await.unwrap());
        assert!(!tab.click("#missing").await.unwrap());

        tab.close().await.unwrap();
        assert!(matches!(tab.content().await, Err(IngestError::BrowserClosed)));
    }
}
