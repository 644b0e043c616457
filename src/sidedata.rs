//! Stop-word list and system-message pattern set, loaded once per process.
//!
//! The teacher has no precedent for runtime side-file loading, so these are
//! embedded at compile time and parsed lazily on first access — a self-contained
//! binary rather than one that breaks when a data directory goes missing.

use once_cell::sync::Lazy;
use std::collections::HashSet;

const STOPWORDS_RAW: &str = include_str!("data/stopwords.txt");
const SYSTEM_PATTERNS_RAW: &str = include_str!("data/system_patterns.json");

pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    STOPWORDS_RAW
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
});

pub static SYSTEM_PATTERNS: Lazy<Vec<String>> = Lazy::new(|| {
    serde_json::from_str::<Vec<String>>(SYSTEM_PATTERNS_RAW)
        .expect("system_patterns.json must be a valid JSON array of strings")
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect()
});

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// True when the lower-cased body matches a system/media marker that should be
/// dropped (but still counted in the raw-message count).
pub fn is_system_or_media(lower_body: &str) -> bool {
    if lower_body.contains("<attached:")
        || lower_body.contains(" omitted>")
        || lower_body.contains("omitted media")
    {
        return true;
    }
    SYSTEM_PATTERNS.iter().any(|p| lower_body.contains(p.as_str()))
}
