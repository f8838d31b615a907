/// Scraper name constants to ensure consistency across the codebase
/// These are the user-facing names accepted by the CLI and config tables
pub const EVENT_FINDER_SCRAPER: &str = "event_finder";
pub const CURT_SCRAPER: &str = "curt";
pub const RAUSGEGANGEN_SCRAPER: &str = "rausgegangen";
pub const EVENTBRITE_SCRAPER: &str = "eventbrite";
pub const PARKS_SCRAPER: &str = "parks";
pub const HYBRID_SCRAPER: &str = "hybrid";

// Listing base URLs
pub const EVENT_FINDER_BASE_URL: &str = "https://www.eventfinder.de/veranstaltungen";
pub const CURT_BASE_URL: &str = "https://www.curt.de/nbg/termine";
pub const RAUSGEGANGEN_BASE_URL: &str = "https://rausgegangen.de/nuernberg/kategorie/alle/";
pub const EVENTBRITE_BASE_URL: &str = "https://www.eventbrite.de/d/germany--nürnberg/events/";
pub const PARKS_BASE_URL: &str = "https://www.parks-nuernberg.de/programm";

/// Hostname suffix → scraper name used when the LLM path yields nothing.
/// Matched against the URL host with any `www.` prefix removed.
pub const FALLBACK_DOMAINS: &[(&str, &str)] = &[
    ("eventfinder.de", EVENT_FINDER_SCRAPER),
    ("curt.de", CURT_SCRAPER),
    ("rausgegangen.de", RAUSGEGANGEN_SCRAPER),
    ("eventbrite.de", EVENTBRITE_SCRAPER),
    ("eventbrite.com", EVENTBRITE_SCRAPER),
    ("parks-nuernberg.de", PARKS_SCRAPER),
];

pub const DEFAULT_CATEGORY_ID: &str = "default";

/// Category ids events may carry; anything else collapses to `default`.
pub const ALLOWED_CATEGORY_IDS: &[&str] = &[
    "konzert",
    "party",
    "theater",
    "kinder",
    "ausstellung",
    "sport",
    "festival",
    "markt",
    "fuehrung",
    "lesung",
    "comedy",
    "film",
    "workshop",
    "kulinarik",
    DEFAULT_CATEGORY_ID,
];

// Mistral
pub const MISTRAL_DEFAULT_MODEL: &str = "mistral-small-latest";
pub const MISTRAL_DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

// Browser defaults: a mobile Safari profile
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 375;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 812;

/// Get all supported scraper names
pub fn get_supported_scrapers() -> Vec<&'static str> {
    vec![
        EVENT_FINDER_SCRAPER,
        CURT_SCRAPER,
        RAUSGEGANGEN_SCRAPER,
        EVENTBRITE_SCRAPER,
        PARKS_SCRAPER,
    ]
}
