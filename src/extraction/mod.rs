pub mod cost_tracker;
pub mod html_cleaner;
pub mod hybrid;
pub mod mistral;
pub mod normalizer;

pub use cost_tracker::{CostTracker, ModelPrice, ModelUsage};
pub use html_cleaner::HtmlCleaner;
pub use hybrid::{ExtractOptions, ExtractionMethod, HybridExtraction, HybridExtractor};
pub use mistral::{EventExtractor, MistralExtractor};
pub use normalizer::{canonical_category_id, EventNormalizer};
