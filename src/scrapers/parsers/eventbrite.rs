use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::{css, page_param, window_from_query};
use crate::common::constants::{EVENTBRITE_BASE_URL, EVENTBRITE_SCRAPER};
use crate::common::dates::{parse_dotted_date, parse_iso_date};
use crate::common::error::Result;
use crate::common::types::ScrapeOptions;
use crate::scrapers::base::{RawListing, ScraperConfig, SiteParser};

static LD_JSON: Lazy<Selector> = Lazy::new(|| css(r#"script[type="application/ld+json"]"#));

/// Eventbrite search pages. Events come from the schema.org JSON-LD blocks
/// rather than the rendered cards.
pub struct EventbriteParser;

impl EventbriteParser {
    pub fn new() -> Self {
        Self
    }

    /// Collects every schema.org `*Event` object from a JSON-LD value,
    /// descending into arrays, `@graph` and `itemListElement` wrappers.
    fn collect_events<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::collect_events(item, out);
                }
            }
            Value::Object(map) => {
                let is_event = map
                    .get("@type")
                    .and_then(Value::as_str)
                    .map_or(false, |t| t.ends_with("Event"));
                if is_event {
                    out.push(value);
                    return;
                }
                for key in ["@graph", "itemListElement", "item"] {
                    if let Some(inner) = map.get(key) {
                        Self::collect_events(inner, out);
                    }
                }
            }
            _ => {}
        }
    }

    fn listing_from_json(event: &Value) -> RawListing {
        let text = |key: &str| {
            event
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let start = text("startDate");
        let end = text("endDate");
        let times: Vec<String> = [start.as_deref(), end.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(clock_time_of)
            .collect();

        RawListing {
            title: text("name"),
            date_text: start,
            end_date_text: end,
            time_text: (!times.is_empty()).then(|| times.join(" - ")),
            location: location_of(event.get("location")),
            description: text("description"),
            url: text("url"),
            price_text: price_of(event.get("offers")),
            category: None,
        }
    }
}

impl Default for EventbriteParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `HH:mm` of an ISO datetime; `None` for date-only values.
fn clock_time_of(value: &str) -> Option<String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.format("%H:%M").to_string());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|datetime| datetime.format("%H:%M").to_string())
}

fn location_of(location: Option<&Value>) -> Option<String> {
    let location = location?;
    if let Some(name) = location.as_str() {
        return Some(name.to_string());
    }
    let name = location.get("name").and_then(Value::as_str);
    let address = match location.get("address") {
        Some(Value::String(address)) => Some(address.clone()),
        Some(address) if address.is_object() => {
            let parts: Vec<&str> = ["streetAddress", "postalCode", "addressLocality"]
                .iter()
                .filter_map(|key| address.get(*key).and_then(Value::as_str))
                .filter(|part| !part.trim().is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    };
    match (name, address) {
        (Some(name), Some(address)) => Some(format!("{}, {}", name, address)),
        (Some(name), None) => Some(name.to_string()),
        (None, address) => address,
    }
}

fn price_of(offers: Option<&Value>) -> Option<String> {
    let offer = match offers? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let amount = ["lowPrice", "price"]
        .iter()
        .find_map(|key| match offer.get(*key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.replace(',', ".").parse().ok(),
            _ => None,
        })?;
    if amount == 0.0 {
        return Some("Kostenlos".to_string());
    }
    let currency = offer
        .get("priceCurrency")
        .and_then(Value::as_str)
        .unwrap_or("EUR");
    Some(format!("{:.2} {}", amount, currency))
}

impl SiteParser for EventbriteParser {
    fn name(&self) -> &'static str {
        EVENTBRITE_SCRAPER
    }

    fn default_config(&self) -> ScraperConfig {
        ScraperConfig::new(EVENTBRITE_BASE_URL, "%Y-%m-%d").with_pagination("page={page}", 3)
    }

    fn list_selector(&self) -> &'static str {
        r#"script[type="application/ld+json"]"#
    }

    fn cookie_banner_selectors(&self) -> &'static [&'static str] {
        &["button[data-testid='consent-accept']", "#_evidon-accept-button"]
    }

    fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let mut listings = Vec::new();
        for script in document.select(&LD_JSON) {
            let raw = script.text().collect::<String>();
            let value: Value = match serde_json::from_str(raw.trim()) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Skipping unparsable JSON-LD block: {}", e);
                    continue;
                }
            };
            let mut events = Vec::new();
            Self::collect_events(&value, &mut events);
            listings.extend(events.into_iter().map(Self::listing_from_json));
        }
        listings
    }

    fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        parse_iso_date(text).or_else(|| parse_dotted_date(text, reference))
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

    const FIXTURE: &str = r#"
        <html><head>
        <script type="application/ld+json">
        {"@context":"https://schema.org","@type":"ItemList","itemListElement":[
          {"@type":"ListItem","position":1,"item":{
            "@type":"MusicEvent","name":"Indie Night",
            "startDate":"2026-10-25T20:00:00+02:00","endDate":"2026-10-25T23:30:00+02:00",
            "url":"https://www.eventbrite.de/e/indie-night-1",
            "location":{"@type":"Place","name":"Hirsch","address":{"streetAddress":"Vogelweiherstr. 66","addressLocality":"Nürnberg"}},
            "offers":[{"@type":"AggregateOffer","lowPrice":"15.00","priceCurrency":"EUR"}]}},
          {"@type":"ListItem","position":2,"item":{
            "@type":"Event","name":"Open Air Yoga","startDate":"2026-10-26",
            "location":{"@type":"Place","name":"Stadtpark"},
            "offers":{"@type":"Offer","price":0}}}
        ]}
        </script>
        <script type="application/ld+json">{ not json</script>
        </head><body></body></html>
    "#;

    #[test]
    fn test_extracts_events_from_json_ld() {
        let listings = EventbriteParser::new().extract_listings(FIXTURE);
        assert_eq!(listings.len(), 2);

        let indie = &listings[0];
        assert_eq!(indie.title.as_deref(), Some("Indie Night"));
        assert_eq!(indie.time_text.as_deref(), Some("20:00 - 23:30"));
        assert_eq!(indie.location.as_deref(), Some("Hirsch, Vogelweiherstr. 66 Nürnberg"));
        assert_eq!(indie.price_text.as_deref(), Some("15.00 EUR"));

        let yoga = &listings[1];
        assert_eq!(yoga.time_text, None);
        assert_eq!(yoga.price_text.as_deref(), Some("Kostenlos"));
        assert_eq!(
            EventbriteParser::new().parse_date(yoga.date_text.as_deref().unwrap(), NaiveDate::MIN),
            NaiveDate::from_ymd_opt(2026, 10, 26)
        );
    }

    #[test]
    fn test_build_url_pages() {
        let parser = EventbriteParser::new();
        let config = parser.default_config();
        let day = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let options = ScrapeOptions {
            page: Some(3),
            ..ScrapeOptions::for_date(day)
        };
        let url = parser.build_url(&config, &options).unwrap();
        assert!(url.starts_with("https://www.eventbrite.de/d/germany--n"));
        assert!(url.ends_with("?start_date=2026-10-25&end_date=2026-10-25&page=3"));
        assert_eq!(parser.date_window_from_url(&config, &url), Some((day, day)));
    }
}
