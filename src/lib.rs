pub mod browser;
pub mod common;
pub mod config;
pub mod extraction;
pub mod import;
pub mod logging;
pub mod metrics;
pub mod scrapers;
pub mod storage;

pub use common::error::{IngestError, Result};
pub use common::types::{Category, DailyTimeSlot, Event, Location, ScrapeOptions, ScraperResult};
