use chrono::NaiveDate;
use std::sync::Arc;

use event_ingest::browser::{BrowserPool, InMemoryBrowser};
use event_ingest::config::BrowserSettings;
use event_ingest::scrapers::base::next_page_from_pattern;
use event_ingest::scrapers::{create_scraper, EventScraper, ScraperService, ScraperType};
use event_ingest::{IngestError, ScrapeOptions};

const CURT_DAY: &str = r#"
<html><body>
  <div class="termine">
    <h3>Samstag, 25. Oktober 2026</h3>
    <div class="termin">
      <a href="/nbg/termine/123"><span class="termin-titel">Lesung am Fluss</span></a>
      <span class="termin-ort">Stadtbibliothek</span>
      <span class="termin-rubrik">Lesung</span>
    </div>
    <div class="termin">
      <span class="termin-titel">Clubnacht</span>
      <span class="termin-zeit">23:00</span>
      <span class="termin-preis">8 €</span>
    </div>
    <h3>Sonntag, 26. Oktober 2026</h3>
    <div class="termin">
      <span class="termin-titel">Flohmarkt</span>
    </div>
  </div>
</body></html>
"#;

fn event_finder_page(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|title| {
            format!(
                r#"<article class="event-item"><h2 class="event-title">{}</h2><span class="event-date">25.10.2026</span></article>"#,
                title
            )
        })
        .collect();
    format!(r#"<html><body><div class="event-list">{}</div></body></html>"#, items)
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn pool_for(browser: &InMemoryBrowser) -> Arc<BrowserPool> {
    Arc::new(BrowserPool::new(Arc::new(browser.launcher()), BrowserSettings::default()))
}

#[tokio::test]
async fn test_service_scrapes_curt_day() {
    let browser = InMemoryBrowser::new().with_page("https://www.curt.de/nbg/termine/2026-10-25", CURT_DAY);
    let pool = pool_for(&browser);
    let service = ScraperService::empty(pool.clone());
    service.activate_scraper(ScraperType::Curt).await;

    let events = service.scrape_events_for_date(date(25)).await.unwrap();

    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Lesung am Fluss", "Clubnacht"]);
    assert_eq!(events[0].category_id, "lesung");
    assert_eq!(events[0].website.as_deref(), Some("https://www.curt.de/nbg/termine/123"));
    assert_eq!(events[0].location.address, "Stadtbibliothek");
    assert_eq!(events[1].daily_time_slots[0].from.as_deref(), Some("23:00"));
    assert_eq!(events[1].price, Some(8.0));

    // every tab handed out was closed again
    assert_eq!(browser.tabs_opened(), browser.tabs_closed());
    pool.close_browser().await.unwrap();
    assert!(!pool.is_launched().await);
}

#[tokio::test]
async fn test_pagination_follows_next_pages() {
    let browser = InMemoryBrowser::new();
    let pool = pool_for(&browser);
    let scraper = create_scraper(ScraperType::EventFinder, pool.clone(), None);
    let options = ScrapeOptions::for_date(date(25));

    let first = scraper.generate_url(&options).unwrap();
    let second = next_page_from_pattern(&first, "seite={page}").unwrap();
    let third = next_page_from_pattern(&second, "seite={page}").unwrap();
    browser.add_page(first.clone(), event_finder_page(&["Jazz im Hof", "Herbstmarkt"]));
    browser.add_page(second.clone(), event_finder_page(&["Clubnacht"]));
    browser.add_page(third.clone(), event_finder_page(&[]));

    let events = scraper.scrape_events(&options).await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(browser.visits(), vec![first, second, third]);
}

#[tokio::test]
async fn test_failed_navigation_is_scraping_error_and_closes_tab() {
    let browser = InMemoryBrowser::new();
    let pool = pool_for(&browser);
    let scraper = create_scraper(ScraperType::Curt, pool, None);

    let err = scraper
        .scrape_events_from_url("https://www.curt.de/nbg/termine/2026-10-25")
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Scraping { .. }));
    assert_eq!(browser.tabs_opened(), 1);
    assert_eq!(browser.tabs_closed(), 1);
}

#[tokio::test]
async fn test_fan_out_fails_when_one_scraper_fails() {
    let browser = InMemoryBrowser::new().with_page("https://www.curt.de/nbg/termine/2026-10-25", CURT_DAY);
    let service = ScraperService::empty(pool_for(&browser));
    service.activate_scraper(ScraperType::Curt).await;
    service.activate_scraper(ScraperType::Rausgegangen).await;

    let settled = service.scrape_all_settled(&ScrapeOptions::for_date(date(25))).await;
    assert_eq!(settled.len(), 2);
    assert!(settled.iter().any(|(kind, result)| *kind == ScraperType::Curt && result.is_ok()));

    assert!(service.scrape_events_for_date(date(25)).await.is_err());
}
