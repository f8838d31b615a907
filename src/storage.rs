//! Collaborator interfaces the ingestion pipeline consumes, with in-memory
//! implementations for development and testing.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::common::error::{IngestError, Result};
use crate::common::types::{Category, Event};

/// Event creation and lookup
#[async_trait]
pub trait EventService: Send + Sync {
    /// Persists `event` and returns the stored copy carrying its final id.
    async fn create(&self, event: Event) -> Result<Event>;

    /// An existing event with the same title on any of `dates`
    async fn find_by_title_and_date(&self, title: &str, dates: &[NaiveDate]) -> Result<Option<Event>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    pub address: String,
    pub label: String,
    pub position: GeoPosition,
}

/// Geocoding
#[async_trait]
pub trait LocationSearch: Send + Sync {
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationSuggestion>>;
}

/// Event category listing
#[async_trait]
pub trait CategoryService: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Category>>;
}

/// In-memory event store for development/testing
#[derive(Default)]
pub struct InMemoryEventService {
    events: Arc<Mutex<HashMap<String, Event>>>,
    failing_titles: Mutex<HashSet<String>>,
    lookups_fail: AtomicBool,
    create_calls: AtomicUsize,
}

impl InMemoryEventService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail for events with this title.
    pub fn fail_create_for(&self, title: impl Into<String>) {
        self.failing_titles.lock().unwrap().insert(title.into());
    }

    /// Makes every duplicate lookup fail.
    pub fn fail_lookups(&self) {
        self.lookups_fail.store(true, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Event> {
        self.events.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl EventService for InMemoryEventService {
    async fn create(&self, mut event: Event) -> Result<Event> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_titles.lock().unwrap().contains(&event.title) {
            return Err(IngestError::collaborator("events", format!("could not store '{}'", event.title)));
        }
        event.id = Uuid::new_v4().to_string();

        let mut events = self.events.lock().unwrap();
        events.insert(event.id.clone(), event.clone());

        debug!("Created event: {} with id {}", event.title, event.id);
        Ok(event)
    }

    async fn find_by_title_and_date(&self, title: &str, dates: &[NaiveDate]) -> Result<Option<Event>> {
        if self.lookups_fail.load(Ordering::SeqCst) {
            return Err(IngestError::collaborator("events", "lookup unavailable"));
        }
        let title = title.trim().to_lowercase();
        let events = self.events.lock().unwrap();
        let existing = events
            .values()
            .find(|e| {
                e.title.trim().to_lowercase() == title
                    && e.daily_time_slots.iter().any(|slot| dates.contains(&slot.date))
            })
            .cloned();
        Ok(existing)
    }
}

/// Location search answering from a fixed table keyed by lower-cased query
#[derive(Default)]
pub struct InMemoryLocationSearch {
    entries: Mutex<HashMap<String, Vec<LocationSuggestion>>>,
    failing: AtomicBool,
}

impl InMemoryLocationSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(self, query: &str, label: &str, lat: f64, lng: f64) -> Self {
        let suggestion = LocationSuggestion {
            address: query.to_string(),
            label: label.to_string(),
            position: GeoPosition { lat, lng },
        };
        self.entries
            .lock()
            .unwrap()
            .entry(query.trim().to_lowercase())
            .or_default()
            .push(suggestion);
        self
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationSearch for InMemoryLocationSearch {
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationSuggestion>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IngestError::collaborator("locations", "geocoder unavailable"));
        }
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&query.trim().to_lowercase()).cloned().unwrap_or_default())
    }
}

/// Fixed category list; order is significant for category matching ties.
pub struct InMemoryCategoryService {
    categories: Vec<Category>,
}

impl InMemoryCategoryService {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Reads a JSON array of `{"id": ..., "name": ...}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let categories: Vec<Category> = serde_json::from_str(&content)?;
        Ok(Self::new(categories))
    }

    /// The platform's standard categories
    pub fn standard() -> Self {
        let categories = [
            ("konzert", "Konzert"),
            ("party", "Party"),
            ("theater", "Theater"),
            ("kinder", "Kinder"),
            ("ausstellung", "Ausstellung"),
            ("sport", "Sport"),
            ("festival", "Festival"),
            ("markt", "Markt"),
            ("fuehrung", "Führung"),
            ("lesung", "Lesung"),
            ("comedy", "Comedy"),
            ("film", "Film"),
            ("workshop", "Workshop"),
            ("kulinarik", "Kulinarik"),
        ]
        .into_iter()
        .map(|(id, name)| Category::new(id, name))
        .collect();
        Self::new(categories)
    }
}

#[async_trait]
impl CategoryService for InMemoryCategoryService {
    async fn find_all(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }
}
