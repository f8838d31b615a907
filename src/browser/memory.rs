use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::engine::{BrowserEngine, BrowserLauncher, BrowserTab, PageSettings, WaitUntil};
use crate::common::error::{IngestError, Result};

#[derive(Default)]
struct FixtureState {
    pages: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    visits: Mutex<Vec<String>>,
    tabs_opened: AtomicUsize,
    tabs_closed: AtomicUsize,
    launches: AtomicUsize,
    last_settings: Mutex<Option<PageSettings>>,
}

/// In-memory browser serving fixture documents by URL, for development/testing
#[derive(Clone, Default)]
pub struct InMemoryBrowser {
    state: Arc<FixtureState>,
}

impl InMemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.add_page(url, html);
        self
    }

    pub fn add_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.state.pages.lock().unwrap().insert(url.into(), html.into());
    }

    /// Navigations to `url` fail as if the site were unreachable.
    pub fn fail_on(&self, url: impl Into<String>) {
        self.state.failing.lock().unwrap().insert(url.into());
    }

    pub fn launcher(&self) -> InMemoryLauncher {
        InMemoryLauncher {
            browser: self.clone(),
        }
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.visits.lock().unwrap().clone()
    }

    pub fn tabs_opened(&self) -> usize {
        self.state.tabs_opened.load(Ordering::SeqCst)
    }

    pub fn tabs_closed(&self) -> usize {
        self.state.tabs_closed.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn last_settings(&self) -> Option<PageSettings> {
        self.state.last_settings.lock().unwrap().clone()
    }
}

/// Launcher handing out the shared in-memory browser
pub struct InMemoryLauncher {
    browser: InMemoryBrowser,
}

#[async_trait]
impl BrowserLauncher for InMemoryLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>> {
        self.browser.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.browser.clone()))
    }
}

#[async_trait]
impl BrowserEngine for InMemoryBrowser {
    async fn new_tab(&self, settings: &PageSettings) -> Result<Box<dyn BrowserTab>> {
        self.state.tabs_opened.fetch_add(1, Ordering::SeqCst);
        *self.state.last_settings.lock().unwrap() = Some(settings.clone());
        Ok(Box::new(InMemoryTab {
            state: self.state.clone(),
            url: None,
            html: None,
            closed: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        debug!("In-memory browser shut down");
        Ok(())
    }
}

struct InMemoryTab {
    state: Arc<FixtureState>,
    url: Option<String>,
    html: Option<String>,
    closed: bool,
}

#[async_trait]
impl BrowserTab for InMemoryTab {
    async fn goto(&mut self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        if self.closed {
            return Err(IngestError::BrowserClosed);
        }
        self.state.visits.lock().unwrap().push(url.to_string());

        if self.state.failing.lock().unwrap().contains(url) {
            return Err(IngestError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        let html = self.state.pages.lock().unwrap().get(url).cloned();
        match html {
            Some(html) => {
                self.url = Some(url.to_string());
                self.html = Some(html);
                Ok(())
            }
            None => Err(IngestError::Navigation {
                url: url.to_string(),
                message: "HTTP status 404 Not Found".to_string(),
            }),
        }
    }

    async fn content(&mut self) -> Result<String> {
        if self.closed {
            return Err(IngestError::BrowserClosed);
        }
        Ok(self.html.clone().unwrap_or_default())
    }

    async fn click(&mut self, selector: &str) -> Result<bool> {
        let html = self.html.as_deref().unwrap_or_default();
        super::document_matches(html, selector)
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.tabs_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
