pub mod base;
pub mod factory;
pub mod parsers;

pub use base::{EventScraper, PageScraper, RawListing, ScraperConfig, SiteParser};
pub use factory::{create_scraper, ScraperService, ScraperType};
