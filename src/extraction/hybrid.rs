use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::mistral::EventExtractor;
use super::normalizer::EventNormalizer;
use crate::browser::{BrowserPool, WaitUntil};
use crate::common::constants::HYBRID_SCRAPER;
use crate::common::error::{IngestError, Result};
use crate::common::types::{Event, ScrapeOptions, ScraperResult};
use crate::metrics::ExtractionMetrics;
use crate::scrapers::base::{EventScraper, ScraperConfig};
use crate::scrapers::factory::{ScraperService, ScraperType};

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Delegate to the domain's site scraper when the LLM path yields nothing
    pub fallback: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { fallback: true }
    }
}

/// Which path produced the events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Llm,
    Fallback,
    Empty,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Llm => "llm",
            ExtractionMethod::Fallback => "fallback",
            ExtractionMethod::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridExtraction {
    pub events: Vec<Event>,
    pub method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_scraper: Option<ScraperType>,
    /// Why the LLM path produced nothing, when it didn't
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_failure: Option<String>,
}

/// Result of the LLM stage
#[derive(Debug)]
enum LlmAttempt {
    Extracted(Vec<Event>),
    EmptyOrFailed(String),
}

/// LLM-first extraction with a per-domain scraper fallback.
///
/// One pass per call: LLM success, fallback result or empty. Nothing is retried.
pub struct HybridExtractor {
    pool: Arc<BrowserPool>,
    extractor: Option<Arc<dyn EventExtractor>>,
    normalizer: EventNormalizer,
    scrapers: Arc<ScraperService>,
    config: ScraperConfig,
}

impl HybridExtractor {
    /// `extractor` may be `None` (no API key), in which case every call goes
    /// straight to the fallback.
    pub fn new(
        pool: Arc<BrowserPool>,
        extractor: Option<Arc<dyn EventExtractor>>,
        scrapers: Arc<ScraperService>,
    ) -> Self {
        Self {
            pool,
            extractor,
            normalizer: EventNormalizer::new(),
            scrapers,
            config: ScraperConfig::new("", "%Y-%m-%d"),
        }
    }

    /// Target page used by the date-driven [`EventScraper`] operations
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    #[instrument(skip(self, options), fields(fallback = options.fallback))]
    pub async fn extract_from_url(&self, url: &str, options: ExtractOptions) -> Result<HybridExtraction> {
        let failure = match self.try_llm(url).await {
            LlmAttempt::Extracted(events) => {
                info!(events = events.len(), "LLM extraction succeeded");
                ExtractionMetrics::record_outcome(ExtractionMethod::Llm.as_str());
                return Ok(HybridExtraction {
                    events,
                    method: ExtractionMethod::Llm,
                    fallback_scraper: None,
                    llm_failure: None,
                });
            }
            LlmAttempt::EmptyOrFailed(reason) => reason,
        };

        if !options.fallback {
            info!(reason = %failure, "LLM path empty and fallback disabled");
            return Ok(Self::empty(None, failure));
        }

        let Some(kind) = ScraperType::from_url(url) else {
            info!(reason = %failure, "No fallback scraper for domain");
            return Ok(Self::empty(None, failure));
        };

        info!(scraper = %kind, reason = %failure, "Falling back to site scraper");
        let result = self.scrapers.scrape_events_from_url(kind, url).await?;
        if result.events.is_empty() {
            return Ok(Self::empty(Some(kind), failure));
        }
        ExtractionMetrics::record_outcome(ExtractionMethod::Fallback.as_str());
        Ok(HybridExtraction {
            events: result.events,
            method: ExtractionMethod::Fallback,
            fallback_scraper: Some(kind),
            llm_failure: Some(failure),
        })
    }

    fn empty(fallback_scraper: Option<ScraperType>, failure: String) -> HybridExtraction {
        ExtractionMetrics::record_outcome(ExtractionMethod::Empty.as_str());
        HybridExtraction {
            events: Vec::new(),
            method: ExtractionMethod::Empty,
            fallback_scraper,
            llm_failure: Some(failure),
        }
    }

    async fn try_llm(&self, url: &str) -> LlmAttempt {
        let Some(extractor) = &self.extractor else {
            return LlmAttempt::EmptyOrFailed("no LLM extractor configured".to_string());
        };
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "Page fetch for LLM extraction failed");
                return LlmAttempt::EmptyOrFailed(format!("page fetch failed: {}", e));
            }
        };
        match extractor.extract_events(&html, url).await {
            Ok(raw) => {
                let events = self.normalizer.normalize_events(&raw);
                if events.is_empty() {
                    LlmAttempt::EmptyOrFailed("LLM returned no usable events".to_string())
                } else {
                    LlmAttempt::Extracted(events)
                }
            }
            Err(e) => {
                warn!(url, error = %e, "LLM extraction failed");
                LlmAttempt::EmptyOrFailed(format!("LLM extraction failed: {}", e))
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let mut page = self.pool.acquire_page().await?;
        let outcome = match page.goto(url, WaitUntil::NetworkIdle).await {
            Ok(()) => page.content().await,
            Err(e) => Err(e),
        };
        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        outcome
    }
}

#[async_trait]
impl EventScraper for HybridExtractor {
    fn name(&self) -> &'static str {
        HYBRID_SCRAPER
    }

    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn initialize(&mut self, config: ScraperConfig) -> Result<()> {
        if !config.is_valid() {
            return Err(IngestError::Config(
                "hybrid extractor needs an absolute target URL".to_string(),
            ));
        }
        self.config = config;
        Ok(())
    }

    /// The hybrid path has no date-aware URL scheme; it always reads its target page.
    fn generate_url(&self, _options: &ScrapeOptions) -> Result<String> {
        if self.config.base_url.is_empty() {
            return Err(IngestError::InvalidInput(
                "hybrid extractor has no target URL".to_string(),
            ));
        }
        Ok(self.config.base_url.clone())
    }

    fn extract_date_from_url(&self, _url: &str) -> Option<NaiveDate> {
        None
    }

    async fn scrape_events_from_url(&self, url: &str) -> Result<ScraperResult> {
        let extraction = self.extract_from_url(url, ExtractOptions::default()).await?;
        Ok(ScraperResult {
            events: extraction.events,
            next_page_url: None,
            has_more_pages: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::InMemoryBrowser;
    use crate::config::BrowserSettings;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CURT_PAGE: &str = "https://www.curt.de/nbg/termine/2026-10-25";

    struct StubExtractor {
        response: std::result::Result<Vec<Value>, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventExtractor for StubExtractor {
        fn model(&self) -> &str {
            "stub"
        }

        async fn extract_events(&self, _html: &str, _url: &str) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().map_err(|_| IngestError::LlmEmptyResponse)
        }
    }

    struct CountingScraper {
        config: ScraperConfig,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventScraper for CountingScraper {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn config(&self) -> &ScraperConfig {
            &self.config
        }
        fn initialize(&mut self, config: ScraperConfig) -> Result<()> {
            self.config = config;
            Ok(())
        }
        fn generate_url(&self, _options: &ScrapeOptions) -> Result<String> {
            Ok(self.config.base_url.clone())
        }
        fn extract_date_from_url(&self, _url: &str) -> Option<NaiveDate> {
            None
        }
        async fn scrape_events_from_url(&self, _url: &str) -> Result<ScraperResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let slot = crate::common::types::DailyTimeSlot::all_day(
                NaiveDate::from_ymd_opt(2026, 10, 25).unwrap(),
            );
            let event = Event::draft("Fallback Event", Default::default(), vec![slot]);
            Ok(ScraperResult {
                events: vec![event],
                next_page_url: None,
                has_more_pages: false,
            })
        }
    }

    async fn setup(
        response: std::result::Result<Vec<Value>, ()>,
    ) -> (HybridExtractor, Arc<StubExtractor>, Arc<AtomicUsize>) {
        let browser = InMemoryBrowser::new().with_page(CURT_PAGE, "<html><body>Termine</body></html>");
        let pool = Arc::new(BrowserPool::new(Arc::new(browser.launcher()), BrowserSettings::default()));
        let scrapers = Arc::new(ScraperService::empty(pool.clone()));
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        scrapers
            .register(
                ScraperType::Curt,
                Arc::new(CountingScraper {
                    config: ScraperConfig::new(CURT_PAGE, "%Y-%m-%d"),
                    calls: fallback_calls.clone(),
                }),
            )
            .await;
        let stub = Arc::new(StubExtractor {
            response,
            calls: AtomicUsize::new(0),
        });
        let extractor: Arc<dyn EventExtractor> = stub.clone();
        (HybridExtractor::new(pool, Some(extractor), scrapers), stub, fallback_calls)
    }

    fn llm_event() -> Value {
        json!({"title": "LLM Event", "location": {"address": "Hirsch"}, "dailyTimeSlots": [{"date": "2026-10-25", "from": "20:00"}]})
    }

    #[tokio::test]
    async fn test_llm_success_skips_fallback() {
        let (hybrid, stub, fallback_calls) = setup(Ok(vec![llm_event()])).await;
        let result = hybrid.extract_from_url(CURT_PAGE, ExtractOptions::default()).await.unwrap();

        assert_eq!(result.method, ExtractionMethod::Llm);
        assert_eq!(result.events[0].title, "LLM Event");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_once() {
        let (hybrid, _, fallback_calls) = setup(Err(())).await;
        let result = hybrid.extract_from_url(CURT_PAGE, ExtractOptions::default()).await.unwrap();

        assert_eq!(result.method, ExtractionMethod::Fallback);
        assert_eq!(result.fallback_scraper, Some(ScraperType::Curt));
        assert_eq!(result.events[0].title, "Fallback Event");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unusable_llm_output_counts_as_empty() {
        let (hybrid, _, fallback_calls) = setup(Ok(vec![json!({"title": "Ohne Datum"})])).await;
        let result = hybrid.extract_from_url(CURT_PAGE, ExtractOptions::default()).await.unwrap();
        assert_eq!(result.method, ExtractionMethod::Fallback);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_fallback_returns_empty() {
        let (hybrid, _, fallback_calls) = setup(Ok(vec![])).await;
        let result = hybrid
            .extract_from_url(CURT_PAGE, ExtractOptions { fallback: false })
            .await
            .unwrap();
        assert_eq!(result.method, ExtractionMethod::Empty);
        assert!(result.events.is_empty());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_domain_returns_empty() {
        let (hybrid, stub, fallback_calls) = setup(Ok(vec![])).await;
        let result = hybrid
            .extract_from_url("https://example.org/events", ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(result.method, ExtractionMethod::Empty);
        // Page is not served by the fixture browser, so the LLM is never asked
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }
}
