use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const FREE_KEYWORDS: &[&str] = &["kostenlos", "frei", "eintritt frei", "free"];

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

/// Numeric price plus the text it was read from
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPrice {
    pub price: Option<f64>,
    pub price_string: Option<String>,
}

/// Reads a free-text price cell such as `"ab 10,00€"` or `"Eintritt frei"`.
pub fn parse_price(text: &str) -> ParsedPrice {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedPrice::default();
    }

    let price = if FREE_KEYWORDS.contains(&trimmed.to_lowercase().as_str()) {
        Some(0.0)
    } else {
        NUMBER
            .find(trimmed)
            .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
    };

    ParsedPrice {
        price,
        price_string: Some(trimmed.to_string()),
    }
}
