use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

use super::document_matches;
use super::engine::{BrowserEngine, BrowserLauncher, BrowserTab, HttpLauncher, PageSettings, WaitUntil};
use crate::common::error::{IngestError, Result};
use crate::config::BrowserSettings;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Owns one lazily launched browser and lends out single-use pages.
///
/// Construct it once, share it through `Arc`, and call [`BrowserPool::close_browser`]
/// for teardown. The browser is never recycled on its own. Concurrent borrowers
/// each get an independent tab; the number of simultaneously open tabs is bounded
/// by `max_concurrent_pages`.
pub struct BrowserPool {
    launcher: Arc<dyn BrowserLauncher>,
    browser: Mutex<Option<Arc<dyn BrowserEngine>>>,
    permits: Arc<Semaphore>,
    settings: BrowserSettings,
    launches: AtomicUsize,
}

impl BrowserPool {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: BrowserSettings) -> Self {
        let max_pages = settings.max_concurrent_pages.max(1);
        Self {
            launcher,
            browser: Mutex::new(None),
            permits: Arc::new(Semaphore::new(max_pages)),
            settings,
            launches: AtomicUsize::new(0),
        }
    }

    /// Pool backed by the HTTP engine
    pub fn http(settings: BrowserSettings) -> Self {
        Self::new(Arc::new(HttpLauncher), settings)
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub async fn is_launched(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    async fn browser(&self) -> Result<Arc<dyn BrowserEngine>> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }
        info!("Launching browser");
        let browser = self.launcher.launch().await?;
        self.launches.fetch_add(1, Ordering::SeqCst);
        *guard = Some(browser.clone());
        Ok(browser)
    }

    /// Borrows a fresh page with the pool's default emulation settings.
    pub async fn acquire_page(&self) -> Result<PageLease> {
        let settings = PageSettings::from_browser_settings(&self.settings);
        self.acquire_page_with(settings).await
    }

    /// Borrows a fresh page with explicit emulation settings.
    pub async fn acquire_page_with(&self, settings: PageSettings) -> Result<PageLease> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::BrowserClosed)?;
        let browser = self.browser().await?;
        let tab = browser.new_tab(&settings).await?;
        debug!(user_agent = %settings.user_agent, width = settings.viewport.width, "Opened page");
        Ok(PageLease {
            tab,
            _permit: permit,
            navigation_timeout: Duration::from_secs(self.settings.navigation_timeout_secs),
            selector_timeout: Duration::from_secs(self.settings.selector_timeout_secs),
            closed: false,
        })
    }

    /// Shuts the browser down. A later borrow launches a new one.
    #[instrument(skip(self))]
    pub async fn close_browser(&self) -> Result<()> {
        let browser = self.browser.lock().await.take();
        match browser {
            Some(browser) => {
                info!("Closing browser");
                browser.shutdown().await
            }
            None => {
                debug!("close_browser called with no running browser");
                Ok(())
            }
        }
    }
}

/// A borrowed page. Close it with [`PageLease::close`]; dropping it releases the
/// pool slot but skips the tab's orderly shutdown.
pub struct PageLease {
    tab: Box<dyn BrowserTab>,
    _permit: OwnedSemaphorePermit,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    closed: bool,
}

impl PageLease {
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    pub fn selector_timeout(&self) -> Duration {
        self.selector_timeout
    }

    pub async fn goto(&mut self, url: &str, wait: WaitUntil) -> Result<()> {
        let timeout = self.navigation_timeout;
        self.goto_with_timeout(url, wait, timeout).await
    }

    pub async fn goto_with_timeout(
        &mut self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(timeout, self.tab.goto(url, wait, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::Navigation {
                url: url.to_string(),
                message: format!("navigation timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    pub async fn content(&mut self) -> Result<String> {
        self.tab.content().await
    }

    pub async fn click(&mut self, selector: &str) -> Result<bool> {
        self.tab.click(selector).await
    }

    pub fn current_url(&self) -> Option<&str> {
        self.tab.current_url()
    }

    /// Polls the DOM until `selector` matches or `timeout` elapses.
    pub async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            let html = self.tab.content().await?;
            if document_matches(&html, selector)? {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(IngestError::SelectorTimeout {
                    selector: selector.to_string(),
                    url: self.tab.current_url().unwrap_or_default().to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            let remaining = timeout.saturating_sub(started.elapsed());
            tokio::time::sleep(SELECTOR_POLL_INTERVAL.min(remaining)).await;
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.tab.close().await
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Page dropped without close()");
        }
    }
}
