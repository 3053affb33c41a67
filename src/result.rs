//! Search result types.

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a result description.
pub const DESCRIPTION_LIMIT: usize = 500;

/// Marker appended to descriptions cut at [`DESCRIPTION_LIMIT`].
pub const ELLIPSIS: &str = "...";

/// A single normalized search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Absolute http(s) URL of the result.
    pub url: String,
    /// Result snippet, at most [`DESCRIPTION_LIMIT`] characters plus an ellipsis.
    pub description: String,
    /// Short attribution label, usually the host of `url`.
    pub source: String,
    /// Identifier of the engine that produced the result.
    pub engine: String,
}

impl SearchResult {
    /// Creates a new search result with empty description and source.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            description: String::new(),
            source: String::new(),
            engine: engine.into(),
        }
    }

    /// Sets the description, truncating it to [`DESCRIPTION_LIMIT`].
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = truncate_description(&description.into());
        self
    }

    /// Sets the source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Truncates `text` to [`DESCRIPTION_LIMIT`] characters, appending [`ELLIPSIS`] when cut.
///
/// Counts characters rather than bytes so multi-byte text is never split.
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Returns the host component of `url`, or an empty string.
pub fn source_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Returns `true` if `url` is an absolute http or https URL with a host.
pub fn is_web_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_new() {
        let result = SearchResult::new("Title", "https://example.com", "bing");
        assert_eq!(result.title, "Title");
        assert_eq!(result.url, "https://example.com");
        assert_eq!(result.engine, "bing");
        assert!(result.description.is_empty());
        assert!(result.source.is_empty());
    }

    #[test]
    fn test_search_result_builder() {
        let result = SearchResult::new("Title", "https://example.com", "baidu")
            .with_description("Snippet")
            .with_source("example.com");
        assert_eq!(result.description, "Snippet");
        assert_eq!(result.source, "example.com");
    }

    #[test]
    fn test_with_description_truncates() {
        let long = "a".repeat(DESCRIPTION_LIMIT + 20);
        let result = SearchResult::new("t", "https://example.com", "bing").with_description(long);
        assert_eq!(result.description.chars().count(), DESCRIPTION_LIMIT + ELLIPSIS.len());
        assert!(result.description.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncate_description_short_untouched() {
        assert_eq!(truncate_description("short"), "short");
        let exact = "b".repeat(DESCRIPTION_LIMIT);
        assert_eq!(truncate_description(&exact), exact);
    }

    #[test]
    fn test_truncate_description_multibyte() {
        let text = "百度".repeat(DESCRIPTION_LIMIT);
        let cut = truncate_description(&text);
        assert!(cut.ends_with(ELLIPSIS));
        assert_eq!(cut.chars().count(), DESCRIPTION_LIMIT + ELLIPSIS.len());
    }

    #[test]
    fn test_source_from_url() {
        assert_eq!(source_from_url("https://www.rust-lang.org/learn"), "www.rust-lang.org");
        assert_eq!(source_from_url("not a url"), "");
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url("https://example.com/a"));
        assert!(is_web_url("http://example.com"));
        assert!(!is_web_url("ftp://example.com"));
        assert!(!is_web_url("javascript:void(0)"));
        assert!(!is_web_url("/relative/path"));
        assert!(!is_web_url(""));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Rust \n  Programming\tLanguage "), "Rust Programming Language");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult::new("Title", "https://example.com", "duckduckgo")
            .with_source("example.com");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"url\":\"https://example.com\""));
        assert!(json.contains("\"engine\":\"duckduckgo\""));
        assert!(json.contains("\"source\":\"example.com\""));
    }
}
