use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use url::Url;

use crate::browser::BrowserPool;
use crate::common::constants::*;
use crate::common::error::{IngestError, Result};
use crate::common::types::{Event, ScrapeOptions, ScraperResult};
use crate::config::{AppConfig, ScraperOverrides};
use crate::scrapers::base::{EventScraper, PageScraper, ScraperConfig};
use crate::scrapers::parsers::*;

/// Closed set of site scrapers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperType {
    EventFinder,
    Curt,
    Rausgegangen,
    Eventbrite,
    Parks,
}

impl ScraperType {
    pub fn all() -> [ScraperType; 5] {
        [
            ScraperType::EventFinder,
            ScraperType::Curt,
            ScraperType::Rausgegangen,
            ScraperType::Eventbrite,
            ScraperType::Parks,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperType::EventFinder => EVENT_FINDER_SCRAPER,
            ScraperType::Curt => CURT_SCRAPER,
            ScraperType::Rausgegangen => RAUSGEGANGEN_SCRAPER,
            ScraperType::Eventbrite => EVENTBRITE_SCRAPER,
            ScraperType::Parks => PARKS_SCRAPER,
        }
    }

    /// Scraper able to parse pages of `host`, via the fallback domain table.
    pub fn from_host(host: &str) -> Option<ScraperType> {
        let host = host.trim().to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        FALLBACK_DOMAINS
            .iter()
            .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
            .and_then(|(_, name)| name.parse().ok())
    }

    pub fn from_url(url: &str) -> Option<ScraperType> {
        let url = Url::parse(url).ok()?;
        Self::from_host(url.host_str()?)
    }
}

impl fmt::Display for ScraperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScraperType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            EVENT_FINDER_SCRAPER | "eventfinder" => Ok(ScraperType::EventFinder),
            CURT_SCRAPER => Ok(ScraperType::Curt),
            RAUSGEGANGEN_SCRAPER => Ok(ScraperType::Rausgegangen),
            EVENTBRITE_SCRAPER => Ok(ScraperType::Eventbrite),
            PARKS_SCRAPER => Ok(ScraperType::Parks),
            other => Err(IngestError::ScraperNotFound(other.to_string())),
        }
    }
}

/// Factory function to create scrapers over the shared browser pool
pub fn create_scraper(
    kind: ScraperType,
    pool: Arc<BrowserPool>,
    overrides: Option<&ScraperOverrides>,
) -> Box<dyn EventScraper> {
    match kind {
        ScraperType::EventFinder => {
            Box::new(PageScraper::new(EventFinderParser::new(), pool).with_overrides(overrides))
        }
        ScraperType::Curt => Box::new(PageScraper::new(CurtParser::new(), pool).with_overrides(overrides)),
        ScraperType::Rausgegangen => {
            Box::new(PageScraper::new(RausgegangenParser::new(), pool).with_overrides(overrides))
        }
        ScraperType::Eventbrite => {
            Box::new(PageScraper::new(EventbriteParser::new(), pool).with_overrides(overrides))
        }
        ScraperType::Parks => Box::new(PageScraper::new(ParksParser::new(), pool).with_overrides(overrides)),
    }
}

/// Registry of active scrapers with concurrent fan-out.
pub struct ScraperService {
    pool: Arc<BrowserPool>,
    overrides: BTreeMap<ScraperType, ScraperOverrides>,
    active: RwLock<BTreeMap<ScraperType, Arc<dyn EventScraper>>>,
}

impl ScraperService {
    /// Service with every scraper type active.
    pub fn new(pool: Arc<BrowserPool>, config: &AppConfig) -> Self {
        let overrides: BTreeMap<ScraperType, ScraperOverrides> = config
            .scrapers
            .iter()
            .filter_map(|(name, overrides)| match name.parse::<ScraperType>() {
                Ok(kind) => Some((kind, overrides.clone())),
                Err(_) => {
                    warn!(scraper = %name, "Ignoring overrides for unknown scraper");
                    None
                }
            })
            .collect();

        let active = ScraperType::all()
            .into_iter()
            .map(|kind| {
                let scraper: Arc<dyn EventScraper> =
                    Arc::from(create_scraper(kind, pool.clone(), overrides.get(&kind)));
                (kind, scraper)
            })
            .collect();

        Self {
            pool,
            overrides,
            active: RwLock::new(active),
        }
    }

    /// Service with nothing active; scrapers are added through `activate_scraper`/`register`.
    pub fn empty(pool: Arc<BrowserPool>) -> Self {
        Self {
            pool,
            overrides: BTreeMap::new(),
            active: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.pool
    }

    /// Installs a specific implementation for `kind`, replacing any active one.
    pub async fn register(&self, kind: ScraperType, scraper: Arc<dyn EventScraper>) {
        self.active.write().await.insert(kind, scraper);
    }

    /// Activates `kind` with its configured defaults. No-op when already active.
    pub async fn activate_scraper(&self, kind: ScraperType) {
        let mut active = self.active.write().await;
        if active.contains_key(&kind) {
            return;
        }
        let scraper = create_scraper(kind, self.pool.clone(), self.overrides.get(&kind));
        active.insert(kind, Arc::from(scraper));
        info!(scraper = %kind, "Activated scraper");
    }

    pub async fn deactivate_scraper(&self, kind: ScraperType) -> bool {
        let removed = self.active.write().await.remove(&kind).is_some();
        if removed {
            info!(scraper = %kind, "Deactivated scraper");
        }
        removed
    }

    pub async fn active_scrapers(&self) -> Vec<ScraperType> {
        self.active.read().await.keys().copied().collect()
    }

    pub async fn is_active(&self, kind: ScraperType) -> bool {
        self.active.read().await.contains_key(&kind)
    }

    /// Replaces the configuration of `kind` with `config` and activates it.
    pub async fn initialize_scraper(&self, kind: ScraperType, config: ScraperConfig) -> Result<()> {
        let mut scraper = create_scraper(kind, self.pool.clone(), None);
        scraper.initialize(config)?;
        self.active.write().await.insert(kind, Arc::from(scraper));
        Ok(())
    }

    pub async fn get_scraper(&self, kind: ScraperType) -> Result<Arc<dyn EventScraper>> {
        self.active
            .read()
            .await
            .get(&kind)
            .cloned()
            .ok_or_else(|| IngestError::ScraperNotFound(kind.to_string()))
    }

    async fn snapshot(&self) -> Vec<(ScraperType, Arc<dyn EventScraper>)> {
        self.active
            .read()
            .await
            .iter()
            .map(|(kind, scraper)| (*kind, scraper.clone()))
            .collect()
    }

    /// Runs every active scraper concurrently, waiting for all of them, and
    /// reports each outcome separately.
    pub async fn scrape_all_settled(
        &self,
        options: &ScrapeOptions,
    ) -> Vec<(ScraperType, Result<Vec<Event>>)> {
        let scrapers = self.snapshot().await;
        let runs = scrapers.iter().map(|(kind, scraper)| async move {
            (*kind, scraper.scrape_events(options).await)
        });
        join_all(runs).await
    }

    /// Concatenated events of all active scrapers. The first failure is
    /// returned once every scraper has finished.
    #[instrument(skip(self, options))]
    pub async fn scrape_all(&self, options: &ScrapeOptions) -> Result<Vec<Event>> {
        let outcomes = self.scrape_all_settled(options).await;
        let mut events = Vec::new();
        let mut first_error = None;
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    info!(scraper = %kind, events = found.len(), "Scraper finished");
                    events.extend(found);
                }
                Err(e) => {
                    warn!(scraper = %kind, error = %e, "Scraper failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(events),
        }
    }

    pub async fn scrape_events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        self.scrape_all(&ScrapeOptions::for_date(date)).await
    }

    pub async fn scrape_events_for_date_range(
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
        self.scrape_all(&ScrapeOptions::for_range(start, end)).await
    }

    /// Scrapes one page with the scraper registered for `kind`.
    pub async fn scrape_events_from_url(&self, kind: ScraperType, url: &str) -> Result<ScraperResult> {
        let scraper = self.get_scraper(kind).await?;
        scraper.scrape_events_from_url(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserSettings;

    fn service() -> ScraperService {
        let pool = Arc::new(BrowserPool::http(BrowserSettings::default()));
        ScraperService::new(pool, &AppConfig::default())
    }

    #[test]
    fn test_scraper_type_names_round_trip() {
        for kind in ScraperType::all() {
            assert_eq!(kind.as_str().parse::<ScraperType>().unwrap(), kind);
        }
        assert_eq!("EventFinder".parse::<ScraperType>().unwrap(), ScraperType::EventFinder);
        assert!(matches!(
            "facebook".parse::<ScraperType>(),
            Err(IngestError::ScraperNotFound(_))
        ));
    }

    #[test]
    fn test_fallback_domain_lookup() {
        assert_eq!(
            ScraperType::from_url("https://www.curt.de/nbg/termine/123"),
            Some(ScraperType::Curt)
        );
        assert_eq!(
            ScraperType::from_url("https://www.eventbrite.com/e/foo"),
            Some(ScraperType::Eventbrite)
        );
        assert_eq!(
            ScraperType::from_url("https://nuernberg.rausgegangen.de/x"),
            Some(ScraperType::Rausgegangen)
        );
        assert_eq!(ScraperType::from_url("https://notcurt.de/"), None);
        assert_eq!(ScraperType::from_url("https://example.org/"), None);
        assert_eq!(ScraperType::from_url("not a url"), None);
    }

    #[tokio::test]
    async fn test_activation_toggles_membership() {
        let service = service();
        assert_eq!(service.active_scrapers().await.len(), 5);

        assert!(service.deactivate_scraper(ScraperType::Parks).await);
        assert!(!service.deactivate_scraper(ScraperType::Parks).await);
        assert!(!service.is_active(ScraperType::Parks).await);

        let err = service
            .scrape_events_from_url(ScraperType::Parks, PARKS_BASE_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ScraperNotFound(_)));

        service.activate_scraper(ScraperType::Parks).await;
        assert!(service.is_active(ScraperType::Parks).await);
    }

    #[tokio::test]
    async fn test_initialize_rejects_invalid_config() {
        let service = service();
        let bad = ScraperConfig::new("not a url", "%Y-%m-%d");
        assert!(service.initialize_scraper(ScraperType::Curt, bad).await.is_err());

        let good = ScraperConfig::new("https://www.curt.de/fue/termine", "%Y-%m-%d");
        service
            .initialize_scraper(ScraperType::Curt, good.clone())
            .await
            .unwrap();
        let curt = service.get_scraper(ScraperType::Curt).await.unwrap();
        assert_eq!(curt.config(), &good);
    }

    #[tokio::test]
    async fn test_reversed_range_is_rejected() {
        let service = service();
        let start = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        assert!(matches!(
            service.scrape_events_for_date_range(start, end).await,
            Err(IngestError::InvalidInput(_))
        ));
    }
}
