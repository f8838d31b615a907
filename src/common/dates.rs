//! Date and clock-time helpers shared by the site scrapers, the LLM normalizer
//! and the CSV import.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").unwrap());
static DOTTED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})?").unwrap());
static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\.\s*([A-Za-zÄÖÜäöü]{3,})\.?,?(?:\s+(\d{4}))?").unwrap()
});
static COLON_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").unwrap());
static DOTTED_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3])\.([0-5]\d)\s*Uhr").unwrap());
static HOUR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3])\s*Uhr").unwrap());

/// Listings without a year that would land further in the past than this are
/// assumed to belong to the next year.
const YEAR_ROLLOVER_DAYS: i64 = 60;

/// German month names and common abbreviations
pub fn german_month(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    let month = match lower.as_str() {
        "januar" | "jan" | "jänner" => 1,
        "februar" | "feb" => 2,
        "märz" | "maerz" | "mär" | "mrz" => 3,
        "april" | "apr" => 4,
        "mai" => 5,
        "juni" | "jun" => 6,
        "juli" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "oktober" | "okt" => 10,
        "november" | "nov" => 11,
        "dezember" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Strict `YYYY-MM-DD` shape check
pub fn is_iso_date(text: &str) -> bool {
    ISO_DATE.is_match(text)
}

/// Strict `HH:mm` shape check
pub fn is_clock_time(text: &str) -> bool {
    CLOCK_TIME.is_match(text)
}

/// Parses an ISO calendar date, also accepting a full ISO datetime and keeping its date.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.date())
        .ok()
}

/// Parses `H:mm`/`HH:mm` and normalizes to `HH:mm`.
pub fn parse_clock_time(text: &str) -> Option<String> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .ok()
        .map(|time| time.format("%H:%M").to_string())
}

/// Resolves a day/month pair without a year against `reference`.
pub fn infer_year(day: u32, month: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference - Duration::days(YEAR_ROLLOVER_DAYS) {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

/// Finds a `DD.MM.YYYY`, `DD.MM.YY` or `DD.MM.` date anywhere in `text`.
pub fn parse_dotted_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let caps = DOTTED_DATE.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    match caps.get(3) {
        Some(year) => {
            let mut year: i32 = year.as_str().parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            NaiveDate::from_ymd_opt(year, month, day)
        }
        None => infer_year(day, month, reference),
    }
}

/// Finds a `D. Monat [YYYY]` date (German month name or abbreviation) in `text`.
pub fn parse_long_german_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    for caps in LONG_DATE.captures_iter(text) {
        let Some(month) = caps.get(2).and_then(|m| german_month(m.as_str())) else {
            continue;
        };
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        return match caps.get(3) {
            Some(year) => NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, day),
            None => infer_year(day, month, reference),
        };
    }
    None
}

/// All clock times mentioned in free text, in order, as `HH:mm`.
///
/// Understands `20:00`, `19.30 Uhr` and `20 Uhr`.
pub fn find_clock_times(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = COLON_TIME
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
            Some((whole.start(), format!("{:02}:{}", hour, caps.get(2)?.as_str())))
        })
        .collect();

    if found.is_empty() {
        found = DOTTED_TIME
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
                Some((whole.start(), format!("{:02}:{}", hour, caps.get(2)?.as_str())))
            })
            .collect();
    }
    if found.is_empty() {
        found = HOUR_ONLY
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
                Some((whole.start(), format!("{:02}:00", hour)))
            })
            .collect();
    }

    found.sort_by_key(|(position, _)| *position);
    found.into_iter().map(|(_, time)| time).collect()
}

/// Every day from `start` to `end` inclusive; empty when `end < start`.
pub fn date_span(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_dotted_date_variants() {
        let reference = date(2026, 10, 1);
        assert_eq!(parse_dotted_date("Sa, 25.10.2026", reference), Some(date(2026, 10, 25)));
        assert_eq!(parse_dotted_date("25.10.26", reference), Some(date(2026, 10, 25)));
        assert_eq!(parse_dotted_date("Fr 24.10.", reference), Some(date(2026, 10, 24)));
        assert_eq!(parse_dotted_date("kein Datum", reference), None);
    }

    #[test]
    fn test_year_rolls_over_for_early_months() {
        let reference = date(2026, 12, 1);
        assert_eq!(parse_dotted_date("09.01.", reference), Some(date(2027, 1, 9)));
        // Recent past stays in the current year
        assert_eq!(parse_dotted_date("20.11.", reference), Some(date(2026, 11, 20)));
    }

    #[test]
    fn test_parse_long_german_date() {
        let reference = date(2026, 1, 1);
        assert_eq!(
            parse_long_german_date("Samstag, 5. Oktober 2026", reference),
            Some(date(2026, 10, 5))
        );
        assert_eq!(
            parse_long_german_date("Do, 12. März", reference),
            Some(date(2026, 3, 12))
        );
        assert_eq!(parse_long_german_date("25. Okt. | 20:00", reference), Some(date(2026, 10, 25)));
        assert_eq!(parse_long_german_date("5. Foobar 2026", reference), None);
    }

    #[test]
    fn test_find_clock_times() {
        assert_eq!(find_clock_times("20:00 - 23:30 Uhr"), vec!["20:00", "23:30"]);
        assert_eq!(find_clock_times("Einlass 9:30, Beginn 10:00"), vec!["09:30", "10:00"]);
        assert_eq!(find_clock_times("Beginn 19.30 Uhr"), vec!["19:30"]);
        assert_eq!(find_clock_times("ab 20 Uhr"), vec!["20:00"]);
        assert!(find_clock_times("ganztägig").is_empty());
    }

    #[test]
    fn test_parse_iso_date_accepts_datetimes() {
        assert_eq!(parse_iso_date("2026-10-25"), Some(date(2026, 10, 25)));
        assert_eq!(parse_iso_date("2026-10-25T20:00:00+02:00"), Some(date(2026, 10, 25)));
        assert_eq!(parse_iso_date("2026-10-25T20:00"), Some(date(2026, 10, 25)));
        assert_eq!(parse_iso_date("25.10.2026"), None);
        assert_eq!(parse_iso_date("2026-02-30"), None);
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("9:05").as_deref(), Some("09:05"));
        assert_eq!(parse_clock_time("20:00").as_deref(), Some("20:00"));
        assert_eq!(parse_clock_time("25:00"), None);
        assert_eq!(parse_clock_time("8 Uhr"), None);
    }

    #[test]
    fn test_date_span_inclusive() {
        let span = date_span(date(2026, 10, 30), date(2026, 11, 1));
        assert_eq!(span, vec![date(2026, 10, 30), date(2026, 10, 31), date(2026, 11, 1)]);
        assert!(date_span(date(2026, 11, 2), date(2026, 11, 1)).is_empty());
    }
}
