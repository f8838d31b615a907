use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::browser::{BrowserPool, PageLease, PageSettings, Viewport, WaitUntil};
use crate::common::dates::{date_span, find_clock_times};
use crate::common::error::{IngestError, Result};
use crate::common::types::{DailyTimeSlot, Event, Location, ScrapeOptions, ScraperResult};
use crate::config::ScraperOverrides;
use crate::extraction::normalizer::canonical_category_id;
use crate::import::price::parse_price;
use crate::metrics::ScraperMetrics;

/// Longest multi-day run a single listing may expand into
const MAX_LISTING_DAYS: usize = 62;

/// Static configuration of one scraper instance
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub base_url: String,
    /// chrono format used when a date is written into the listing URL
    pub date_format: String,
    /// Query fragment with a `{page}` placeholder, e.g. `page={page}`
    pub pagination_pattern: Option<String>,
    pub max_pages: u32,
    pub max_results: usize,
    /// Query parameters appended to every generated URL
    pub query_params: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub viewport: Option<(u32, u32)>,
}

impl ScraperConfig {
    pub fn new(base_url: impl Into<String>, date_format: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            date_format: date_format.into(),
            pagination_pattern: None,
            max_pages: 1,
            max_results: 100,
            query_params: BTreeMap::new(),
            user_agent: None,
            viewport: None,
        }
    }

    pub fn with_pagination(mut self, pattern: impl Into<String>, max_pages: u32) -> Self {
        self.pagination_pattern = Some(pattern.into());
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn apply_overrides(&mut self, overrides: &ScraperOverrides) {
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(date_format) = &overrides.date_format {
            self.date_format = date_format.clone();
        }
        if overrides.pagination_pattern.is_some() {
            self.pagination_pattern = overrides.pagination_pattern.clone();
        }
        if let Some(max_pages) = overrides.max_pages {
            self.max_pages = max_pages;
        }
        if let Some(max_results) = overrides.max_results {
            self.max_results = max_results;
        }
        for (key, value) in &overrides.query_params {
            self.query_params.insert(key.clone(), value.clone());
        }
        if overrides.user_agent.is_some() {
            self.user_agent = overrides.user_agent.clone();
        }
        if let (Some(width), Some(height)) = (overrides.viewport_width, overrides.viewport_height) {
            self.viewport = Some((width, height));
        }
    }

    /// Structural validity: absolute http(s) base URL, non-empty date format,
    /// positive limits, pagination pattern carrying `{page}`.
    pub fn is_valid(&self) -> bool {
        let url_ok = Url::parse(&self.base_url)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        let pagination_ok = self
            .pagination_pattern
            .as_deref()
            .map_or(true, |pattern| pattern.contains("{page}") && pattern.contains('='));
        url_ok
            && !self.date_format.trim().is_empty()
            && self.max_pages > 0
            && self.max_results > 0
            && pagination_ok
    }

    /// Base URL with the fixed query params and the given ones appended.
    pub fn url_with_params(&self, base: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(base)
            .map_err(|e| IngestError::Config(format!("invalid base URL '{}': {}", base, e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                query.append_pair(key, value);
            }
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.to_string())
    }
}

/// Capability every event source exposes, whatever the site.
#[async_trait]
pub trait EventScraper: Send + Sync {
    fn name(&self) -> &'static str;

    fn config(&self) -> &ScraperConfig;

    /// Replaces the configuration; rejected when it does not validate.
    fn initialize(&mut self, config: ScraperConfig) -> Result<()>;

    fn validate_config(&self) -> bool {
        self.config().is_valid()
    }

    fn generate_url(&self, options: &ScrapeOptions) -> Result<String>;

    fn generate_url_for_date(&self, date: NaiveDate) -> Result<String> {
        self.generate_url(&ScrapeOptions::for_date(date))
    }

    /// Start date encoded in a listing URL, if any
    fn extract_date_from_url(&self, url: &str) -> Option<NaiveDate>;

    /// Scrapes exactly one page.
    async fn scrape_events_from_url(&self, url: &str) -> Result<ScraperResult>;

    /// Best-effort dismissal of consent overlays. Never fatal.
    async fn handle_cookie_banner(&self, _page: &mut PageLease) -> Result<()> {
        Ok(())
    }

    async fn scrape_events(&self, options: &ScrapeOptions) -> Result<Vec<Event>> {
        let url = self.generate_url(options)?;
        let result = self.scrape_events_from_url(&url).await?;
        let max_results = options.max_results.unwrap_or(self.config().max_results);
        let mut events: Vec<Event> = result
            .events
            .into_iter()
            .filter(|event| options.accepts(event))
            .collect();
        events.truncate(max_results);
        Ok(events)
    }

    async fn scrape_events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        self.scrape_events(&ScrapeOptions::for_date(date)).await
    }

    async fn scrape_events_for_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>> {
        if end < start {
            return Err(IngestError::InvalidInput(format!(
                "date range end {} is before start {}",
                end, start
            )));
        }
        self.scrape_events(&ScrapeOptions::for_range(start, end)).await
    }
}

/// Fields lifted from one event card before any conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub title: Option<String>,
    pub date_text: Option<String>,
    pub end_date_text: Option<String>,
    pub time_text: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub price_text: Option<String>,
    pub category: Option<String>,
}

/// Site-specific knowledge: selectors, date format and URL scheme.
///
/// `extract_listings` is pure over the document so it can be tested against
/// fixture HTML without a browser.
pub trait SiteParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_config(&self) -> ScraperConfig;

    /// Container that must be present before extraction starts
    fn list_selector(&self) -> &'static str;

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &[]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing>;

    /// Site date rule; `reference` anchors listings that omit the year.
    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate>;

    fn build_url(&self, config: &ScraperConfig, options: &ScrapeOptions) -> Result<String>;

    /// Date window a listing URL was generated for
    fn date_window_from_url(&self, config: &ScraperConfig, url: &str) -> Option<(NaiveDate, NaiveDate)>;

    /// Location used when a card carries none
    fn default_location(&self) -> Option<&'static str> {
        None
    }

    fn next_page_url(
        &self,
        config: &ScraperConfig,
        current_url: &str,
        _window: Option<(NaiveDate, NaiveDate)>,
    ) -> Option<String> {
        let pattern = config.pagination_pattern.as_deref()?;
        next_page_from_pattern(current_url, pattern)
    }
}

/// Increments the page parameter described by `pattern` (`key={page}`).
pub fn next_page_from_pattern(current_url: &str, pattern: &str) -> Option<String> {
    let (key, _) = pattern.split_once('=')?;
    let mut url = Url::parse(current_url).ok()?;
    let current_page = url
        .query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .unwrap_or(1);
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        query.append_pair(key, &(current_page + 1).to_string());
    }
    Some(url.to_string())
}

/// Browser-driven scraper running the shared listing algorithm over a [`SiteParser`].
pub struct PageScraper<P: SiteParser> {
    parser: P,
    config: ScraperConfig,
    pool: Arc<BrowserPool>,
}

impl<P: SiteParser> PageScraper<P> {
    pub fn new(parser: P, pool: Arc<BrowserPool>) -> Self {
        let config = parser.default_config();
        Self {
            parser,
            config,
            pool,
        }
    }

    pub fn with_overrides(mut self, overrides: Option<&ScraperOverrides>) -> Self {
        if let Some(overrides) = overrides {
            self.config.apply_overrides(overrides);
        }
        self
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    fn page_settings(&self) -> PageSettings {
        let mut settings = PageSettings::from_browser_settings(self.pool.settings());
        if let Some(user_agent) = &self.config.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some((width, height)) = self.config.viewport {
            settings.viewport = Viewport {
                width,
                height,
                is_mobile: settings.viewport.is_mobile,
            };
        }
        settings
    }

    /// Turns raw cards into events; cards missing a title or a parseable date are dropped.
    pub fn convert_listings(
        &self,
        listings: Vec<RawListing>,
        page_url: &str,
        reference: NaiveDate,
    ) -> Vec<Event> {
        let base = Url::parse(page_url).ok();
        let total = listings.len();
        let events: Vec<Event> = listings
            .into_iter()
            .filter_map(|listing| self.listing_to_event(listing, base.as_ref(), reference))
            .collect();
        if events.len() < total {
            debug!(
                scraper = self.parser.name(),
                dropped = total - events.len(),
                "Dropped listings without title or date"
            );
        }
        events
    }

    fn listing_to_event(
        &self,
        listing: RawListing,
        base: Option<&Url>,
        reference: NaiveDate,
    ) -> Option<Event> {
        let title = listing.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let start = self.parser.parse_date(listing.date_text.as_deref()?, reference)?;
        let end = listing
            .end_date_text
            .as_deref()
            .and_then(|text| self.parser.parse_date(text, start))
            .filter(|end| *end >= start)
            .unwrap_or(start);

        let times = listing
            .time_text
            .as_deref()
            .map(find_clock_times)
            .unwrap_or_default();
        let from = times.first().cloned();
        let to = times.get(1).cloned();

        let slots: Vec<DailyTimeSlot> = date_span(start, end)
            .into_iter()
            .take(MAX_LISTING_DAYS)
            .map(|date| DailyTimeSlot::new(date, from.clone(), to.clone()))
            .collect();

        let address = listing
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .or(self.parser.default_location())
            .unwrap_or_default();

        let mut event = Event::draft(title, Location::unresolved(address), slots);
        event.description = listing.description.map(|d| d.trim().to_string()).unwrap_or_default();
        event.website = listing.url.and_then(|href| resolve_link(base, &href));
        if let Some(category) = listing.category.as_deref() {
            event.category_id = canonical_category_id(Some(category));
        }
        if let Some(price_text) = listing.price_text.as_deref() {
            let price = parse_price(price_text);
            event.price = price.price;
            event.price_string = price.price_string;
        }
        Some(event)
    }

    async fn scrape_page(
        &self,
        url: &str,
        window: Option<(NaiveDate, NaiveDate)>,
        max_results: usize,
    ) -> Result<ScraperResult> {
        let started = Instant::now();
        let mut page = self.pool.acquire_page_with(self.page_settings()).await?;
        let outcome = self.scrape_with_page(&mut page, url, window, max_results).await;
        if let Err(e) = page.close().await {
            warn!(scraper = self.parser.name(), error = %e, "Failed to close page");
        }

        match &outcome {
            Ok(result) => {
                ScraperMetrics::record_page(
                    self.parser.name(),
                    result.events.len(),
                    started.elapsed().as_secs_f64(),
                );
                info!(
                    scraper = self.parser.name(),
                    url,
                    events = result.events.len(),
                    has_more_pages = result.has_more_pages,
                    "Scraped page"
                );
            }
            Err(e) => {
                ScraperMetrics::record_failure(self.parser.name());
                error!(scraper = self.parser.name(), url, error = %e, "Scraping failed");
            }
        }
        outcome
    }

    async fn scrape_with_page(
        &self,
        page: &mut PageLease,
        url: &str,
        window: Option<(NaiveDate, NaiveDate)>,
        max_results: usize,
    ) -> Result<ScraperResult> {
        let name = self.parser.name();
        page.goto(url, WaitUntil::NetworkIdle)
            .await
            .map_err(|e| IngestError::scraping(name, e.to_string()))?;

        if let Err(e) = self.handle_cookie_banner(page).await {
            debug!(scraper = name, error = %e, "Cookie banner handling failed");
        }

        let selector_timeout = page.selector_timeout();
        page.wait_for_selector(self.parser.list_selector(), selector_timeout)
            .await
            .map_err(|e| IngestError::scraping(name, e.to_string()))?;

        let html = page.content().await?;
        let listings = self.parser.extract_listings(&html);
        let raw_count = listings.len();

        let reference = window.map(|(start, _)| start).unwrap_or_else(|| Local::now().date_naive());
        let mut events = self.convert_listings(listings, url, reference);
        if let Some((start, end)) = window {
            let filter = ScrapeOptions::for_range(start, end);
            events.retain(|event| filter.accepts(event));
        }

        let has_more_pages = events.len() > max_results;
        events.truncate(max_results);

        let next_page_url = if raw_count > 0 {
            self.parser.next_page_url(&self.config, url, window)
        } else {
            None
        };

        Ok(ScraperResult {
            events,
            next_page_url,
            has_more_pages,
        })
    }
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}

#[async_trait]
impl<P: SiteParser> EventScraper for PageScraper<P> {
    fn name(&self) -> &'static str {
        self.parser.name()
    }

    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn initialize(&mut self, config: ScraperConfig) -> Result<()> {
        if !config.is_valid() {
            return Err(IngestError::Config(format!(
                "invalid configuration for scraper {}",
                self.parser.name()
            )));
        }
        self.config = config;
        Ok(())
    }

    fn generate_url(&self, options: &ScrapeOptions) -> Result<String> {
        self.parser.build_url(&self.config, options)
    }

    fn extract_date_from_url(&self, url: &str) -> Option<NaiveDate> {
        self.parser
            .date_window_from_url(&self.config, url)
            .map(|(start, _)| start)
    }

    #[instrument(skip(self), fields(scraper = self.parser.name()))]
    async fn scrape_events_from_url(&self, url: &str) -> Result<ScraperResult> {
        let window = self.parser.date_window_from_url(&self.config, url);
        self.scrape_page(url, window, self.config.max_results).await
    }

    async fn handle_cookie_banner(&self, page: &mut PageLease) -> Result<()> {
        for selector in self.parser.cookie_banner_selectors() {
            match page.click(selector).await {
                Ok(true) => {
                    debug!(scraper = self.parser.name(), selector, "Dismissed cookie banner");
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    debug!(scraper = self.parser.name(), selector, error = %e, "Cookie banner click failed");
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self, options), fields(scraper = self.parser.name()))]
    async fn scrape_events(&self, options: &ScrapeOptions) -> Result<Vec<Event>> {
        let window = match (options.start_date, options.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            (Some(start), None) => Some((start, start)),
            (None, Some(end)) => Some((end, end)),
            (None, None) => None,
        };
        let max_results = options.max_results.unwrap_or(self.config.max_results);

        let mut events = Vec::new();
        let mut next_url = Some(self.generate_url(options)?);
        let mut pages = 0u32;

        while let Some(url) = next_url.take() {
            pages += 1;
            let result = self.scrape_page(&url, window, max_results).await?;
            events.extend(result.events);
            if events.len() >= max_results || pages >= self.config.max_pages {
                break;
            }
            next_url = result.next_page_url;
        }

        events.truncate(max_results);
        Ok(events)
    }
}
