use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::common::error::Result;

pub const COL_TITLE: &str = "Titel";
pub const COL_DESCRIPTION: &str = "Beschreibung";
pub const COL_START_DATE: &str = "Startdatum";
pub const COL_END_DATE: &str = "Enddatum";
pub const COL_START_TIME: &str = "Startzeit";
pub const COL_END_TIME: &str = "Endzeit";
pub const COL_VENUE: &str = "Veranstaltungsort";
pub const COL_CATEGORIES: &str = "Kategorien";
pub const COL_PRICE: &str = "Preis";
pub const COL_TICKETS: &str = "Tickets";
pub const COL_EMAIL: &str = "E-Mail";
pub const COL_PHONE: &str = "Telefon";
pub const COL_WEBSITE: &str = "Webseite";
pub const COL_SOCIAL_MEDIA: &str = "Social Media";
pub const COL_IMAGE_URL: &str = "Bild-URL";
pub const COL_DETAIL_URL: &str = "Detail-URL";

/// The import template's columns in template order
pub const CSV_COLUMNS: [&str; 16] = [
    COL_TITLE,
    COL_DESCRIPTION,
    COL_START_DATE,
    COL_END_DATE,
    COL_START_TIME,
    COL_END_TIME,
    COL_VENUE,
    COL_CATEGORIES,
    COL_PRICE,
    COL_TICKETS,
    COL_EMAIL,
    COL_PHONE,
    COL_WEBSITE,
    COL_SOCIAL_MEDIA,
    COL_IMAGE_URL,
    COL_DETAIL_URL,
];

/// One data row of an import file. Absent columns read as empty strings.
///
/// `social_media` and `image_url` are read but never imported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRow {
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub venue: String,
    pub categories: String,
    pub price: String,
    pub tickets: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub social_media: String,
    pub image_url: String,
    pub detail_url: String,
}

impl CsvRow {
    fn from_record(record: &StringRecord, columns: &HashMap<&'static str, usize>) -> Self {
        let cell = |column: &str| {
            columns
                .get(column)
                .and_then(|index| record.get(*index))
                .unwrap_or_default()
                .to_string()
        };
        Self {
            title: cell(COL_TITLE),
            description: cell(COL_DESCRIPTION),
            start_date: cell(COL_START_DATE),
            end_date: cell(COL_END_DATE),
            start_time: cell(COL_START_TIME),
            end_time: cell(COL_END_TIME),
            venue: cell(COL_VENUE),
            categories: cell(COL_CATEGORIES),
            price: cell(COL_PRICE),
            tickets: cell(COL_TICKETS),
            email: cell(COL_EMAIL),
            phone: cell(COL_PHONE),
            website: cell(COL_WEBSITE),
            social_media: cell(COL_SOCIAL_MEDIA),
            image_url: cell(COL_IMAGE_URL),
            detail_url: cell(COL_DETAIL_URL),
        }
    }

    /// `Webseite`, else `Detail-URL`
    pub fn website_or_detail_url(&self) -> Option<String> {
        [&self.website, &self.detail_url]
            .into_iter()
            .find(|value| !value.is_empty())
            .cloned()
    }

    pub fn tickets_needed(&self) -> Option<bool> {
        parse_tickets(&self.tickets)
    }
}

pub fn parse_tickets(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "ja" | "yes" | "true" | "1" | "x" => Some(true),
        "nein" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// `;` when the header line has more semicolons than commas, else `,`.
pub fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Header names that are missing from, unknown to, or repeated against the
/// import template. Only the first of repeated columns is read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderReport {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub duplicated: Vec<String>,
}

/// Template column name to the index of its first occurrence in `headers`
fn column_index(headers: &[String]) -> HashMap<&'static str, usize> {
    let mut columns = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        if let Some(column) = CSV_COLUMNS.iter().find(|column| **column == header.as_str()) {
            columns.entry(*column).or_insert(index);
        }
    }
    columns
}

fn check_headers(headers: &[String]) -> HeaderReport {
    let missing = CSV_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .map(|column| column.to_string())
        .collect();
    let unexpected = headers
        .iter()
        .filter(|h| !h.is_empty() && !CSV_COLUMNS.contains(&h.as_str()))
        .cloned()
        .collect();
    let mut duplicated: Vec<String> = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if !header.is_empty() && headers[..index].contains(header) && !duplicated.contains(header) {
            duplicated.push(header.clone());
        }
    }
    HeaderReport {
        missing,
        unexpected,
        duplicated,
    }
}

/// Parses file content into rows, mapping columns by header name.
pub fn parse_rows(content: &str) -> Result<(Vec<CsvRow>, HeaderReport)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = detect_delimiter(content);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let report = check_headers(&headers);
    if !report.missing.is_empty() {
        warn!(columns = ?report.missing, "CSV is missing expected columns");
    }
    if !report.unexpected.is_empty() {
        warn!(columns = ?report.unexpected, "CSV has unexpected columns, ignoring them");
    }
    if !report.duplicated.is_empty() {
        warn!(columns = ?report.duplicated, "CSV repeats columns, reading the first of each");
    }

    let columns = column_index(&headers);
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(CsvRow::from_record(&record?, &columns));
    }
    debug!(rows = rows.len(), delimiter = %(delimiter as char), "Parsed CSV rows");
    Ok((rows, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_file_with_bom() {
        let content = "\u{feff}Titel;Startdatum;Preis;Tickets\n Jazz im Hof ;2026-10-25;12,50 €;ja\n";
        let (rows, report) = parse_rows(content).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Jazz im Hof");
        assert_eq!(rows[0].price, "12,50 €");
        assert_eq!(rows[0].tickets_needed(), Some(true));
        assert_eq!(rows[0].venue, "");
        assert!(report.missing.contains(&"Veranstaltungsort".to_string()));
    }

    #[test]
    fn test_comma_file_with_extra_column() {
        let content = "Titel,Startdatum,Intern\n\"Lesung, mit Musik\",2026-11-02,x\n";
        let (rows, report) = parse_rows(content).unwrap();
        assert_eq!(rows[0].title, "Lesung, mit Musik");
        assert_eq!(report.unexpected, vec!["Intern".to_string()]);
    }

    #[test]
    fn test_short_rows_default_to_empty() {
        let content = "Titel;Startdatum;Enddatum\nFlohmarkt;2026-11-01\n";
        let (rows, _) = parse_rows(content).unwrap();
        assert_eq!(rows[0].start_date, "2026-11-01");
        assert_eq!(rows[0].end_date, "");
    }

    #[test]
    fn test_repeated_column_reads_first_occurrence() {
        let content = "Titel;Startdatum;Titel\nJazz im Hof;2026-10-25;Kopie\nFlohmarkt;2026-11-01;\n";
        let (rows, report) = parse_rows(content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Jazz im Hof");
        assert_eq!(rows[1].title, "Flohmarkt");
        assert_eq!(rows[1].start_date, "2026-11-01");
        assert_eq!(report.duplicated, vec!["Titel".to_string()]);
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn test_website_prefers_webseite() {
        let row = CsvRow {
            website: "https://a.test".to_string(),
            detail_url: "https://b.test".to_string(),
            ..Default::default()
        };
        assert_eq!(row.website_or_detail_url().as_deref(), Some("https://a.test"));
        let row = CsvRow {
            detail_url: "https://b.test".to_string(),
            ..Default::default()
        };
        assert_eq!(row.website_or_detail_url().as_deref(), Some("https://b.test"));
    }

    #[test]
    fn test_tickets_values() {
        assert_eq!(parse_tickets("X"), Some(true));
        assert_eq!(parse_tickets("Nein"), Some(false));
        assert_eq!(parse_tickets("vielleicht"), None);
    }
}
