// Common utilities and shared types used across the application

pub mod constants;
pub mod dates;
pub mod error;
pub mod types;

// Re-export commonly used items at module root for convenience
pub use error::{IngestError, Result};
pub use types::{
    Category, DailyTimeSlot, Event, Location, ScrapeOptions, ScraperResult, SocialMedia,
};
