use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::category::map_category_to_id;
use super::price::parse_price;
use super::row::{
    parse_rows, CsvRow, COL_CATEGORIES, COL_END_DATE, COL_END_TIME, COL_START_DATE, COL_START_TIME,
    COL_TITLE, COL_VENUE,
};
use crate::common::constants::DEFAULT_CATEGORY_ID;
use crate::common::dates::{date_span, is_iso_date, parse_clock_time, parse_iso_date};
use crate::common::error::Result;
use crate::common::types::{DailyTimeSlot, Event, Location};
use crate::config::ImportSettings;
use crate::metrics::ImportMetrics;
use crate::storage::{CategoryService, EventService, LocationSearch};

/// Field-level problem with one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvRowError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl CsvRowError {
    fn new(field: &str, message: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            value: value.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvRowResult {
    /// 1-based, header excluded
    pub row_index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_event_id: Option<String>,
    pub errors: Vec<CsvRowError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CsvRowResult {
    fn new(row_index: usize) -> Self {
        Self {
            row_index,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportResult {
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<CsvRowResult>,
}

impl CsvImportResult {
    fn push(&mut self, result: CsvRowResult) {
        self.total_rows += 1;
        if result.skipped {
            self.skipped += 1;
        } else if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

/// Longest date range a single row may expand into
const MAX_IMPORT_DAYS: i64 = 366;

/// Validated row content ready to become an event
struct ValidRow {
    title: String,
    slots: Vec<DailyTimeSlot>,
}

/// Bulk event import from the CSV template.
///
/// Rows are processed one after another so a row's duplicate check sees the
/// events created by earlier rows. A failing row never stops the batch.
pub struct CsvImportService {
    events: Arc<dyn EventService>,
    locations: Arc<dyn LocationSearch>,
    categories: Arc<dyn CategoryService>,
    default_category_id: String,
}

impl CsvImportService {
    pub fn new(
        events: Arc<dyn EventService>,
        locations: Arc<dyn LocationSearch>,
        categories: Arc<dyn CategoryService>,
    ) -> Self {
        Self {
            events,
            locations,
            categories,
            default_category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }

    pub fn with_settings(mut self, settings: &ImportSettings) -> Self {
        self.default_category_id = settings.default_category_id.clone();
        self
    }

    pub async fn import_file(&self, path: &Path) -> Result<CsvImportResult> {
        let content = tokio::fs::read_to_string(path).await?;
        self.import_csv(&content).await
    }

    /// Imports every data row; only an unreadable file is an `Err`.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn import_csv(&self, content: &str) -> Result<CsvImportResult> {
        let started = Instant::now();
        let (rows, _) = parse_rows(content)?;
        info!(rows = rows.len(), "Starting CSV import");

        let mut result = CsvImportResult::default();
        for (i, row) in rows.iter().enumerate() {
            let row_result = self.import_row(i + 1, row).await;
            if row_result.skipped {
                info!(row = row_result.row_index, duplicate = ?row_result.duplicate_event_id, "Row skipped as duplicate");
            } else if row_result.success {
                info!(row = row_result.row_index, event_id = ?row_result.event_id, warnings = row_result.warnings.len(), "Row imported");
            } else {
                warn!(row = row_result.row_index, errors = ?row_result.errors, "Row failed");
            }
            result.push(row_result);
        }

        ImportMetrics::record_batch(
            result.successful,
            result.failed,
            result.skipped,
            started.elapsed().as_secs_f64(),
        );
        info!(
            total = result.total_rows,
            successful = result.successful,
            failed = result.failed,
            skipped = result.skipped,
            "CSV import finished"
        );
        Ok(result)
    }

    async fn import_row(&self, row_index: usize, row: &CsvRow) -> CsvRowResult {
        let mut result = CsvRowResult::new(row_index);

        let valid = match validate_row(row) {
            Ok(valid) => valid,
            Err(errors) => {
                result.errors = errors;
                return result;
            }
        };
        let dates: Vec<NaiveDate> = valid.slots.iter().map(|slot| slot.date).collect();

        match self.events.find_by_title_and_date(&valid.title, &dates).await {
            Ok(Some(existing)) => {
                result.skipped = true;
                result.duplicate_event_id = Some(existing.id);
                return result;
            }
            Ok(None) => {}
            Err(e) => {
                // proceed to creation anyway
                warn!(row = row_index, error = %e, "Duplicate check failed");
                result
                    .errors
                    .push(CsvRowError::new("duplicate", format!("Duplicate check failed: {}", e), None));
            }
        }

        let location = self.resolve_location(&row.venue, &mut result.warnings).await;
        let category_id = self.resolve_category(&row.categories, &mut result.warnings).await;
        let price = parse_price(&row.price);

        let mut event = Event::draft(valid.title, location, valid.slots);
        event.description = row.description.clone();
        event.category_id = category_id;
        event.price = price.price;
        event.price_string = price.price_string;
        event.website = row.website_or_detail_url();
        event.contact_email = non_empty(&row.email);
        event.contact_phone = non_empty(&row.phone);
        event.tickets_needed = row.tickets_needed();

        match self.events.create(event).await {
            Ok(created) => {
                result.success = true;
                result.event_id = Some(created.id);
            }
            Err(e) => {
                result
                    .errors
                    .push(CsvRowError::new("event", format!("Event creation failed: {}", e), None));
            }
        }
        result
    }

    async fn resolve_location(&self, venue: &str, warnings: &mut Vec<String>) -> Location {
        if venue.is_empty() {
            warnings.push("No venue given, location left empty".to_string());
            return Location::default();
        }
        match self.locations.search_locations(venue).await {
            Ok(hits) => match hits.into_iter().next() {
                Some(hit) => Location {
                    address: hit.label,
                    latitude: hit.position.lat,
                    longitude: hit.position.lng,
                },
                None => {
                    warnings.push(format!("{}: no location found for '{}'", COL_VENUE, venue));
                    Location::unresolved(venue)
                }
            },
            Err(e) => {
                warnings.push(format!("{}: location search failed for '{}': {}", COL_VENUE, venue, e));
                Location::unresolved(venue)
            }
        }
    }

    async fn resolve_category(&self, input: &str, warnings: &mut Vec<String>) -> String {
        if input.trim().is_empty() {
            return self.default_category_id.clone();
        }
        let categories = match self.categories.find_all().await {
            Ok(categories) => categories,
            Err(e) => {
                warnings.push(format!("{}: categories unavailable: {}", COL_CATEGORIES, e));
                return self.default_category_id.clone();
            }
        };
        let id = map_category_to_id(input, &categories);
        if id == DEFAULT_CATEGORY_ID {
            warnings.push(format!("{}: no category matches '{}'", COL_CATEGORIES, input));
            return self.default_category_id.clone();
        }
        debug!(input, category_id = %id, "Mapped category");
        id
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_date_cell(field: &str, value: &str, errors: &mut Vec<CsvRowError>) -> Option<NaiveDate> {
    let parsed = if is_iso_date(value) {
        parse_iso_date(value)
    } else {
        None
    };
    if parsed.is_none() {
        errors.push(CsvRowError::new(field, "Expected a date as YYYY-MM-DD", Some(value)));
    }
    parsed
}

fn parse_time_cell(field: &str, value: &str, errors: &mut Vec<CsvRowError>) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let parsed = parse_clock_time(value);
    if parsed.is_none() {
        errors.push(CsvRowError::new(field, "Expected a time as HH:mm", Some(value)));
    }
    parsed
}

/// Required fields and date/time formats, then the day-by-day slots.
fn validate_row(row: &CsvRow) -> std::result::Result<ValidRow, Vec<CsvRowError>> {
    let mut errors = Vec::new();

    if row.title.is_empty() {
        errors.push(CsvRowError::new(COL_TITLE, "Title is required", None));
    }
    let start = if row.start_date.is_empty() {
        errors.push(CsvRowError::new(COL_START_DATE, "Start date is required", None));
        None
    } else {
        parse_date_cell(COL_START_DATE, &row.start_date, &mut errors)
    };
    let end = if row.end_date.is_empty() {
        start
    } else {
        parse_date_cell(COL_END_DATE, &row.end_date, &mut errors)
    };
    let from = parse_time_cell(COL_START_TIME, &row.start_time, &mut errors);
    let to = parse_time_cell(COL_END_TIME, &row.end_time, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }
    let (Some(start), Some(end)) = (start, end) else {
        return Err(errors);
    };
    if end < start {
        return Err(vec![CsvRowError::new(
            COL_END_DATE,
            "End date is before start date",
            Some(&row.end_date),
        )]);
    }

    if (end - start).num_days() >= MAX_IMPORT_DAYS {
        return Err(vec![CsvRowError::new(
            COL_END_DATE,
            format!("Events may span at most {} days", MAX_IMPORT_DAYS),
            Some(&row.end_date),
        )]);
    }

    let slots = date_span(start, end)
        .into_iter()
        .map(|date| DailyTimeSlot::new(date, from.clone(), to.clone()))
        .collect();
    Ok(ValidRow {
        title: row.title.clone(),
        slots,
    })
}
