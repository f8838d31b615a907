use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{css, first_attr, first_text, page_param, window_from_query};
use crate::common::constants::{RAUSGEGANGEN_BASE_URL, RAUSGEGANGEN_SCRAPER};
use crate::common::dates::{parse_dotted_date, parse_long_german_date};
use crate::common::error::Result;
use crate::common::types::ScrapeOptions;
use crate::scrapers::base::{RawListing, ScraperConfig, SiteParser};

static TILE: Lazy<Selector> = Lazy::new(|| css("div.event-list .event-tile"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("h4, .event-title"));
static DATE: Lazy<Selector> = Lazy::new(|| css(".event-date"));
static LOCATION: Lazy<Selector> = Lazy::new(|| css(".event-location"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a[href]"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| css(".event-category"));
static PRICE: Lazy<Selector> = Lazy::new(|| css(".event-price"));

/// rausgegangen.de tiles ("25. Okt. | 20:00"), window passed as
/// `start_date`/`end_date` query params. Tiles omit the year, which is
/// resolved against the window start.
pub struct RausgegangenParser;

impl RausgegangenParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RausgegangenParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteParser for RausgegangenParser {
    fn name(&self) -> &'static str {
        RAUSGEGANGEN_SCRAPER
    }

    fn default_config(&self) -> ScraperConfig {
        ScraperConfig::new(RAUSGEGANGEN_BASE_URL, "%Y-%m-%d").with_pagination("page={page}", 2)
    }

    fn list_selector(&self) -> &'static str {
        "div.event-list"
    }

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &["button#cookie-consent-accept", ".cc-btn.cc-allow"]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        document
            .select(&TILE)
            .map(|tile| {
                let date = first_text(tile, &DATE);
                // Date and time share one label
                RawListing {
                    title: first_text(tile, &TITLE),
                    time_text: date.clone(),
                    date_text: date,
                    end_date_text: None,
                    location: first_text(tile, &LOCATION),
                    description: None,
                    url: tile
                        .value()
                        .attr("href")
                        .map(str::to_string)
                        .or_else(|| first_attr(tile, &LINK, "href")),
                    price_text: first_text(tile, &PRICE),
                    category: first_text(tile, &CATEGORY),
                }
            })
            .collect()
    }

    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        parse_long_german_date(text, reference).or_else(|| parse_dotted_date(text, reference))
    }

    fn build_url(&self, config: &ScraperConfig, options: &ScrapeOptions) -> Result<String> {
        let mut params = Vec::new();
        if let Some(start) = options.start_date {
            params.push(("start_date", start.format(&config.date_format).to_string()));
            let end = options.end_date.unwrap_or(start);
            params.push(("end_date", end.format(&config.date_format).to_string()));
        }
        if let Some(page) = page_param(config, options.page) {
            params.push(page);
        }
        config.url_with_params(&config.base_url, &params)
    }

    fn date_window_from_url(&self, config: &ScraperConfig, url: &str) -> Option<(NaiveDate, NaiveDate)> {
        window_from_query(config, url, "start_date", "end_date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::dates::find_clock_times;

    const FIXTURE: &str = r#"
        <div class="event-list">
          <a class="event-tile" href="/events/poetry-slam-123">
            <h4>Poetry Slam</h4>
            <span class="event-date">25. Okt. | 20:00</span>
            <span class="event-location">Z-Bau</span>
            <span class="event-category">Comedy</span>
          </a>
          <a class="event-tile" href="/events/silvester">
            <h4>Silvesterparty</h4>
            <span class="event-date">31. Dez. | 22:00</span>
          </a>
        </div>
    "#;

    #[test]
    fn test_tiles_resolve_year_from_window() {
        let parser = RausgegangenParser::new();
        let listings = parser.extract_listings(FIXTURE);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title.as_deref(), Some("Poetry Slam"));
        assert_eq!(listings[0].url.as_deref(), Some("/events/poetry-slam-123"));
        assert_eq!(
            find_clock_times(listings[0].time_text.as_deref().unwrap()),
            vec!["20:00"]
        );

        let reference = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert_eq!(
            parser.parse_date(listings[0].date_text.as_deref().unwrap(), reference),
            NaiveDate::from_ymd_opt(2026, 10, 25)
        );
        assert_eq!(
            parser.parse_date(listings[1].date_text.as_deref().unwrap(), reference),
            NaiveDate::from_ymd_opt(2026, 12, 31)
        );
    }

    #[test]
    fn test_build_url_uses_querystring_window() {
        let parser = RausgegangenParser::new();
        let config = parser.default_config();
        let day = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let url = parser.build_url(&config, &ScrapeOptions::for_date(day)).unwrap();
        assert_eq!(
            url,
            "https://rausgegangen.de/nuernberg/kategorie/alle/?start_date=2026-10-25&end_date=2026-10-25"
        );
        assert_eq!(parser.date_window_from_url(&config, &url), Some((day, day)));
    }
}
