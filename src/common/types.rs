use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::constants::DEFAULT_CATEGORY_ID;

/// Geographic location of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn unresolved(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

/// One calendar day of an event with optional clock times (`HH:mm`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTimeSlot {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl DailyTimeSlot {
    pub fn new(date: NaiveDate, from: Option<String>, to: Option<String>) -> Self {
        Self { date, from, to }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SocialMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
}

impl SocialMedia {
    pub fn is_empty(&self) -> bool {
        self.instagram.is_none() && self.facebook.is_none() && self.tiktok.is_none()
    }
}

/// Canonical event shape every ingestion path produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Location,
    pub daily_time_slots: Vec<DailyTimeSlot>,
    pub category_id: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media: Option<SocialMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets_needed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_promoted: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_count: Option<u32>,
}

impl Event {
    /// Creates an event with a fresh id and timestamps; optional fields start empty.
    pub fn draft(title: impl Into<String>, location: Location, slots: Vec<DailyTimeSlot>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            location,
            daily_time_slots: slots,
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            price: None,
            price_string: None,
            contact_email: None,
            contact_phone: None,
            website: None,
            social_media: None,
            tickets_needed: None,
            is_promoted: None,
            created_at: now,
            updated_at: now,
            favorite_count: None,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.daily_time_slots.iter().map(|slot| slot.date).min()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.daily_time_slots.iter().map(|slot| slot.date).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Outcome of a single page fetch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperResult {
    pub events: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_url: Option<String>,
    pub has_more_pages: bool,
}

impl ScraperResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Query for a multi-page scrape
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub max_results: Option<usize>,
}

impl ScrapeOptions {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            start_date: Some(date),
            end_date: Some(date),
            ..Default::default()
        }
    }

    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    /// True if any slot of the event falls inside the requested window.
    pub fn accepts(&self, event: &Event) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        event.daily_time_slots.iter().any(|slot| {
            self.start_date.map_or(true, |start| slot.date >= start)
                && self.end_date.map_or(true, |end| slot.date <= end)
        })
    }
}
