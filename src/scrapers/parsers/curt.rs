use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{CaseSensitivity, ElementRef, Html, Selector};
use url::Url;

use super::{clean_text, css, first_attr, first_text, query_value};
use crate::common::constants::{CURT_BASE_URL, CURT_SCRAPER};
use crate::common::dates::{parse_dotted_date, parse_long_german_date};
use crate::common::error::{IngestError, Result};
use crate::common::types::ScrapeOptions;
use crate::scrapers::base::{RawListing, ScraperConfig, SiteParser};

static CONTAINER: Lazy<Selector> = Lazy::new(|| css("div.termine"));
static TITLE: Lazy<Selector> = Lazy::new(|| css(".termin-titel"));
static TIME: Lazy<Selector> = Lazy::new(|| css(".termin-zeit"));
static LOCATION: Lazy<Selector> = Lazy::new(|| css(".termin-ort"));
static TEXT: Lazy<Selector> = Lazy::new(|| css(".termin-text"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a[href]"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| css(".termin-rubrik"));
static PRICE: Lazy<Selector> = Lazy::new(|| css(".termin-preis"));

/// curt.de day listings.
///
/// The page is a flat sequence of `h3` day headings ("Samstag, 25. Oktober 2026")
/// each followed by `div.termin` entries for that day, so entries inherit the
/// date of the nearest heading above them.
pub struct CurtParser;

impl CurtParser {
    pub fn new() -> Self {
        Self
    }

    fn listing_from_entry(entry: ElementRef, date_text: &str) -> RawListing {
        RawListing {
            title: first_text(entry, &TITLE),
            date_text: Some(date_text.to_string()),
            end_date_text: None,
            time_text: first_text(entry, &TIME),
            location: first_text(entry, &LOCATION),
            description: first_text(entry, &TEXT),
            url: first_attr(entry, &LINK, "href"),
            price_text: first_text(entry, &PRICE),
            category: first_text(entry, &CATEGORY),
        }
    }
}

impl Default for CurtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteParser for CurtParser {
    fn name(&self) -> &'static str {
        CURT_SCRAPER
    }

    fn default_config(&self) -> ScraperConfig {
        ScraperConfig::new(CURT_BASE_URL, "%Y-%m-%d")
    }

    fn list_selector(&self) -> &'static str {
        "div.termine"
    }

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &["button.cmplz-accept", "#cookie-accept"]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let mut listings = Vec::new();

        for container in document.select(&CONTAINER) {
            let mut current_date: Option<String> = None;
            for child in container.children() {
                let Some(element) = ElementRef::wrap(child) else {
                    continue;
                };
                match element.value().name() {
                    "h2" | "h3" => current_date = clean_text(element),
                    "div" if element.value().has_class("termin", CaseSensitivity::CaseSensitive) => {
                        // Entries before the first heading have no date and are dropped later
                        let date = current_date.as_deref().unwrap_or_default();
                        listings.push(Self::listing_from_entry(element, date));
                    }
                    _ => {}
                }
            }
        }
        listings
    }

    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        parse_long_german_date(text, reference).or_else(|| parse_dotted_date(text, reference))
    }

    fn build_url(&self, config: &ScraperConfig, options: &ScrapeOptions) -> Result<String> {
        let base = config.base_url.trim_end_matches('/');
        let Some(start) = options.start_date else {
            return config.url_with_params(base, &[]);
        };
        let path = format!("{}/{}", base, start.format(&config.date_format));
        let mut params = Vec::new();
        if let Some(end) = options.end_date.filter(|end| *end != start) {
            if end < start {
                return Err(IngestError::InvalidInput(format!(
                    "end date {} is before start date {}",
                    end, start
                )));
            }
            params.push(("bis", end.format(&config.date_format).to_string()));
        }
        config.url_with_params(&path, &params)
    }

    fn date_window_from_url(&self, config: &ScraperConfig, url: &str) -> Option<(NaiveDate, NaiveDate)> {
        let parsed = Url::parse(url).ok()?;
        let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
        let start = NaiveDate::parse_from_str(segment, &config.date_format).ok()?;
        let end = query_value(url, "bis")
            .and_then(|value| NaiveDate::parse_from_str(&value, &config.date_format).ok())
            .filter(|end| *end >= start)
            .unwrap_or(start);
        Some((start, end))
    }
}
