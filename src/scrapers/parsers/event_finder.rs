use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{clean_text, css, first_attr, first_text, page_param, split_date_range, window_from_query};
use crate::common::constants::{EVENT_FINDER_BASE_URL, EVENT_FINDER_SCRAPER};
use crate::common::dates::parse_dotted_date;
use crate::common::error::Result;
use crate::common::types::ScrapeOptions;
use crate::scrapers::base::{RawListing, ScraperConfig, SiteParser};

static CARD: Lazy<Selector> = Lazy::new(|| css("div.event-list article.event-item"));
static TITLE: Lazy<Selector> = Lazy::new(|| css(".event-title"));
static DATE: Lazy<Selector> = Lazy::new(|| css(".event-date"));
static TIME: Lazy<Selector> = Lazy::new(|| css(".event-time"));
static LOCATION: Lazy<Selector> = Lazy::new(|| css(".event-location"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| css(".event-description"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a[href]"));
static PRICE: Lazy<Selector> = Lazy::new(|| css(".event-price"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| css(".event-category"));

/// eventfinder.de listing pages: `DD.MM.YYYY` dates, `datum`/`bis` query window.
pub struct EventFinderParser;

impl EventFinderParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EventFinderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteParser for EventFinderParser {
    fn name(&self) -> &'static str {
        EVENT_FINDER_SCRAPER
    }

    fn default_config(&self) -> ScraperConfig {
        ScraperConfig::new(EVENT_FINDER_BASE_URL, "%d.%m.%Y").with_pagination("seite={page}", 3)
    }

    fn list_selector(&self) -> &'static str {
        "div.event-list"
    }

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &["#onetrust-accept-btn-handler", "button.cookie-accept"]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        document
            .select(&CARD)
            .map(|card| {
                let (date_text, end_date_text) = match first_text(card, &DATE) {
                    Some(text) => {
                        let (start, end) = split_date_range(&text);
                        (Some(start), end)
                    }
                    None => (None, None),
                };
                RawListing {
                    title: first_text(card, &TITLE),
                    date_text,
                    end_date_text,
                    time_text: first_text(card, &TIME),
                    location: first_text(card, &LOCATION),
                    description: card.select(&DESCRIPTION).next().and_then(clean_text),
                    url: first_attr(card, &LINK, "href"),
                    price_text: first_text(card, &PRICE),
                    category: first_text(card, &CATEGORY),
                }
            })
            .collect()
    }

    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        parse_dotted_date(text, reference)
    }

    fn build_url(&self, config: &ScraperConfig, options: &ScrapeOptions) -> Result<String> {
        let mut params = Vec::new();
        if let Some(start) = options.start_date {
            params.push(("datum", start.format(&config.date_format).to_string()));
            let end = options.end_date.unwrap_or(start);
            params.push(("bis", end.format(&config.date_format).to_string()));
        }
        if let Some(page) = page_param(config, options.page) {
            params.push(page);
        }
        config.url_with_params(&config.base_url, &params)
    }

    fn date_window_from_url(&self, config: &ScraperConfig, url: &str) -> Option<(NaiveDate, NaiveDate)> {
        window_from_query(config, url, "datum", "bis")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
        <div class="event-list">
          <article class="event-item">
            <a href="/veranstaltung/jazz-im-hof">
              <h2 class="event-title">Jazz im Hof</h2>
            </a>
            <span class="event-date">Sa, 25.10.2026</span>
            <span class="event-time">20:00 - 23:00 Uhr</span>
            <span class="event-location">Kulturhof, Nürnberg</span>
            <p class="event-description">Live   Jazz
               mit Gästen</p>
            <span class="event-price">ab 12,50 €</span>
            <span class="event-category">Konzert</span>
          </article>
          <article class="event-item">
            <h2 class="event-title">Herbstmarkt</h2>
            <span class="event-date">Fr, 24.10.2026 - So, 26.10.2026</span>
          </article>
          <article class="event-item">
            <span class="event-date">27.10.2026</span>
          </article>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_listings() {
        let listings = EventFinderParser::new().extract_listings(FIXTURE);
        assert_eq!(listings.len(), 3);

        let jazz = &listings[0];
        assert_eq!(jazz.title.as_deref(), Some("Jazz im Hof"));
        assert_eq!(jazz.date_text.as_deref(), Some("Sa, 25.10.2026"));
        assert_eq!(jazz.description.as_deref(), Some("Live Jazz mit Gästen"));
        assert_eq!(jazz.url.as_deref(), Some("/veranstaltung/jazz-im-hof"));
        assert_eq!(jazz.price_text.as_deref(), Some("ab 12,50 €"));

        let market = &listings[1];
        assert_eq!(market.date_text.as_deref(), Some("Fr, 24.10.2026"));
        assert_eq!(market.end_date_text.as_deref(), Some("So, 26.10.2026"));

        assert!(listings[2].title.is_none());
    }

    #[test]
    fn test_build_url_and_window_round_trip() {
        let parser = EventFinderParser::new();
        let config = parser.default_config();
        let start = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 10, 26).unwrap();

        let url = parser.build_url(&config, &ScrapeOptions::for_range(start, end)).unwrap();
        assert_eq!(
            url,
            "https://www.eventfinder.de/veranstaltungen?datum=24.10.2026&bis=26.10.2026"
        );
        assert_eq!(parser.date_window_from_url(&config, &url), Some((start, end)));

        let paged = ScrapeOptions {
            page: Some(2),
            ..ScrapeOptions::for_date(start)
        };
        assert!(parser.build_url(&config, &paged).unwrap().ends_with("&seite=2"));
    }
}
