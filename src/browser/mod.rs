//! Browser automation resources.
//!
//! A [`BrowserPool`] is created explicitly and injected wherever pages are
//! needed. Engines are pluggable: [`HttpLauncher`] fetches documents over HTTP,
//! [`InMemoryBrowser`] serves fixture HTML.

pub mod engine;
pub mod memory;
pub mod pool;

pub use engine::{
    BrowserEngine, BrowserLauncher, BrowserTab, HttpLauncher, PageSettings, Viewport, WaitUntil,
};
pub use memory::{InMemoryBrowser, InMemoryLauncher};
pub use pool::{BrowserPool, PageLease};

use crate::common::error::{IngestError, Result};
use scraper::{Html, Selector};

/// True if any element of `html` matches the CSS `selector`.
pub(crate) fn document_matches(html: &str, selector: &str) -> Result<bool> {
    let selector = Selector::parse(selector)
        .map_err(|e| IngestError::InvalidInput(format!("invalid selector '{}': {:?}", selector, e)))?;
    let document = Html::parse_document(html);
    let matched = document.select(&selector).next().is_some();
    Ok(matched)
}
