//! Shrinks raw page HTML before it is sent to the LLM.

use once_cell::sync::Lazy;
use regex::Regex;

/// Elements dropped together with their content
const BLOCK_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "iframe", "template", "nav", "footer", "aside", "form",
    "head",
];

static COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BLOCK_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect()
});
/// Unbalanced opening/closing tags and comment markers left behind by broken markup
static STRAY_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<!--|-->|</?(?:script|style|noscript|iframe|template)\b[^>]*>?").unwrap()
});
static NOISY_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s(?:style|class|id|on[a-z]+|data-[a-z0-9_-]+|aria-[a-z-]+)\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .unwrap()
});
static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCleaner;

impl HtmlCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Removes scripts, styles, comments and page chrome, strips presentation
    /// attributes and collapses whitespace.
    pub fn clean(&self, html: &str) -> String {
        let mut current = html.to_string();
        // Every removal can splice a new marker together, so repeat until stable
        loop {
            let mut next = COMMENTS.replace_all(&current, "").into_owned();
            for block in BLOCKS.iter() {
                next = block.replace_all(&next, "").into_owned();
            }
            next = STRAY_MARKERS.replace_all(&next, "").into_owned();
            next = NOISY_ATTRIBUTES.replace_all(&next, "").into_owned();
            next = BETWEEN_TAGS.replace_all(&next, "><").into_owned();
            next = WHITESPACE.replace_all(&next, " ").into_owned();
            if next == current {
                break;
            }
            current = next;
        }
        current.trim().to_string()
    }

    /// [`clean`](Self::clean), then cut to at most `max_chars` characters.
    pub fn clean_and_truncate(&self, html: &str, max_chars: usize) -> String {
        truncate_chars(self.clean(html), max_chars)
    }
}

/// Truncates on a char boundary.
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(index);
    }
    text
}
