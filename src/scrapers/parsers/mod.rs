pub mod curt;
pub mod event_finder;
pub mod eventbrite;
pub mod parks;
pub mod rausgegangen;

pub use curt::CurtParser;
pub use event_finder::EventFinderParser;
pub use eventbrite::EventbriteParser;
pub use parks::ParksParser;
pub use rausgegangen::RausgegangenParser;

use chrono::NaiveDate;
use scraper::{ElementRef, Selector};
use url::Url;

use super::base::ScraperConfig;

/// Parses a selector literal. Only for compile-time constant selectors.
pub(crate) fn css(selector: &'static str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector {selector}: {e:?}"))
}

/// Element text with whitespace collapsed; `None` when blank.
pub(crate) fn clean_text(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub(crate) fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).find_map(clean_text)
}

pub(crate) fn first_attr(element: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Splits `Sa, 25.10. - So, 26.10.2026` style ranges into start and end text.
pub(crate) fn split_date_range(text: &str) -> (String, Option<String>) {
    for separator in [" – ", " - ", "–", " bis "] {
        if let Some((start, end)) = text.split_once(separator) {
            let end = end.trim();
            return (
                start.trim().to_string(),
                (!end.is_empty()).then(|| end.to_string()),
            );
        }
    }
    (text.trim().to_string(), None)
}

/// Value of the query parameter `key` in `url`
pub(crate) fn query_value(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Query pair for `page` following the configured pagination pattern; page 1 adds nothing.
pub(crate) fn page_param(config: &ScraperConfig, page: Option<u32>) -> Option<(&str, String)> {
    let page = page.filter(|p| *p > 1)?;
    let pattern = config.pagination_pattern.as_deref()?;
    let (key, value) = pattern.split_once('=')?;
    Some((key, value.replace("{page}", &page.to_string())))
}

/// Start/end query params read with the scraper's date format.
pub(crate) fn window_from_query(
    config: &ScraperConfig,
    url: &str,
    start_key: &str,
    end_key: &str,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::parse_from_str(&query_value(url, start_key)?, &config.date_format).ok()?;
    let end = query_value(url, end_key)
        .and_then(|value| NaiveDate::parse_from_str(&value, &config.date_format).ok())
        .filter(|end| *end >= start)
        .unwrap_or(start);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_date_range() {
        assert_eq!(
            split_date_range("Sa, 25.10. - So, 26.10.2026"),
            ("Sa, 25.10.".to_string(), Some("So, 26.10.2026".to_string()))
        );
        assert_eq!(split_date_range("25.10.2026"), ("25.10.2026".to_string(), None));
    }

    #[test]
    fn test_page_param_skips_first_page() {
        let config = ScraperConfig::new("https://a.test/", "%Y-%m-%d").with_pagination("page={page}", 3);
        assert_eq!(page_param(&config, Some(1)), None);
        assert_eq!(page_param(&config, Some(2)), Some(("page", "2".to_string())));
        let unpaged = ScraperConfig::new("https://a.test/", "%Y-%m-%d");
        assert_eq!(page_param(&unpaged, Some(2)), None);
    }
}
