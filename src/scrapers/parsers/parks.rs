use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{css, first_attr, first_text, query_value};
use crate::common::constants::{PARKS_BASE_URL, PARKS_SCRAPER};
use crate::common::dates::parse_dotted_date;
use crate::common::error::Result;
use crate::common::types::ScrapeOptions;
use crate::scrapers::base::{RawListing, ScraperConfig, SiteParser};

const VENUE_ADDRESS: &str = "Parks, Berliner Platz 9, 90489 Nürnberg";
const MONTH_PARAM: &str = "monat";

static ITEM: Lazy<Selector> = Lazy::new(|| css("div.programm .programm-item"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("h3"));
static DATE: Lazy<Selector> = Lazy::new(|| css(".datum"));
static TIME: Lazy<Selector> = Lazy::new(|| css(".uhrzeit"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| css(".beschreibung"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a[href]"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| css(".rubrik"));
static PRICE: Lazy<Selector> = Lazy::new(|| css(".eintritt"));

/// Parks Nürnberg monthly programme (`?monat=YYYY-MM`). Single venue, so
/// every event gets the venue address; a range spanning months pages
/// through the following months.
pub struct ParksParser;

impl ParksParser {
    pub fn new() -> Self {
        Self
    }

    fn month_url(config: &ScraperConfig, month: NaiveDate) -> Result<String> {
        config.url_with_params(
            &config.base_url,
            &[(MONTH_PARAM, month.format(&config.date_format).to_string())],
        )
    }

    fn month_from_url(config: &ScraperConfig, url: &str) -> Option<NaiveDate> {
        let value = query_value(url, MONTH_PARAM)?;
        NaiveDate::parse_from_str(&format!("{}-01", value), &format!("{}-%d", config.date_format)).ok()
    }
}

impl Default for ParksParser {
    fn default() -> Self {
        Self::new()
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

impl SiteParser for ParksParser {
    fn name(&self) -> &'static str {
        PARKS_SCRAPER
    }

    fn default_config(&self) -> ScraperConfig {
        let mut config = ScraperConfig::new(PARKS_BASE_URL, "%Y-%m");
        config.max_pages = 3;
        config
    }

    fn list_selector(&self) -> &'static str {
        "div.programm"
    }

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &[".cookie-notice button.accept"]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        document
            .select(&ITEM)
            .map(|item| RawListing {
                title: first_text(item, &TITLE),
                date_text: first_text(item, &DATE),
                end_date_text: None,
                time_text: first_text(item, &TIME),
                location: None,
                description: first_text(item, &DESCRIPTION),
                url: first_attr(item, &LINK, "href"),
                price_text: first_text(item, &PRICE),
                category: first_text(item, &CATEGORY),
            })
            .collect()
    }

    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        parse_dotted_date(text, reference)
    }

    fn build_url(&self, config: &ScraperConfig, options: &ScrapeOptions) -> Result<String> {
        match options.start_date {
            Some(start) => Self::month_url(config, first_of_month(start)),
            None => config.url_with_params(&config.base_url, &[]),
        }
    }

    fn date_window_from_url(&self, config: &ScraperConfig, url: &str) -> Option<(NaiveDate, NaiveDate)> {
        let start = Self::month_from_url(config, url)?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(start);
        Some((start, end))
    }

    fn default_location(&self) -> Option<&'static str> {
        Some(VENUE_ADDRESS)
    }

    fn next_page_url(
        &self,
        config: &ScraperConfig,
        current_url: &str,
        window: Option<(NaiveDate, NaiveDate)>,
    ) -> Option<String> {
        let (_, end) = window?;
        let next = Self::month_from_url(config, current_url)?.checked_add_months(Months::new(1))?;
        if next > end {
            return None;
        }
        Self::month_url(config, next).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_listings() {
        let html = r#"
            <div class="programm">
              <div class="programm-item">
                <span class="datum">Fr 24.10.</span>
                <span class="uhrzeit">Einlass 19:00 | Beginn 20:00</span>
                <h3>Hip-Hop Open Air</h3>
                <span class="rubrik">Konzert</span>
                <span class="eintritt">VVK 18 €</span>
              </div>
            </div>
        "#;
        let parser = ParksParser::new();
        let listings = parser.extract_listings(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title.as_deref(), Some("Hip-Hop Open Air"));
        assert_eq!(listings[0].location, None);
        assert_eq!(parser.default_location(), Some(VENUE_ADDRESS));
        assert_eq!(
            parser.parse_date("Fr 24.10.", date(2026, 10, 1)),
            Some(date(2026, 10, 24))
        );
    }

    #[test]
    fn test_month_urls_and_paging() {
        let parser = ParksParser::new();
        let config = parser.default_config();
        let options = ScrapeOptions::for_range(date(2026, 10, 25), date(2026, 11, 5));

        let url = parser.build_url(&config, &options).unwrap();
        assert_eq!(url, "https://www.parks-nuernberg.de/programm?monat=2026-10");
        assert_eq!(
            parser.date_window_from_url(&config, &url),
            Some((date(2026, 10, 1), date(2026, 10, 31)))
        );

        let window = Some((date(2026, 10, 25), date(2026, 11, 5)));
        let next = parser.next_page_url(&config, &url, window).unwrap();
        assert_eq!(next, "https://www.parks-nuernberg.de/programm?monat=2026-11");
        assert_eq!(parser.next_page_url(&config, &next, window), None);
    }
}
