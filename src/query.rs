//! Search request representation.

use serde::{Deserialize, Serialize};

/// Result count used when a request carries no positive limit.
pub const DEFAULT_LIMIT: usize = 10;

/// A search request as handed over by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search terms.
    pub query: String,
    /// Requested number of results per engine; absent or non-positive means [`DEFAULT_LIMIT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Engines to query, in order. Empty means the configured default engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<String>,
}

impl SearchRequest {
    /// Creates a new request for the given terms.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            engines: Vec::new(),
        }
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets specific engines to use.
    pub fn with_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engines = engines.into_iter().map(Into::into).collect();
        self
    }

    /// The limit each engine is asked to honour.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => usize::try_from(limit).unwrap_or(usize::MAX),
            _ => DEFAULT_LIMIT,
        }
    }

    /// Requested engines with duplicates removed, first occurrence wins.
    pub fn unique_engines(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.engines.len());
        for name in &self.engines {
            let name = name.trim();
            if !name.is_empty() && !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_new() {
        let request = SearchRequest::new("golang");
        assert_eq!(request.query, "golang");
        assert!(request.limit.is_none());
        assert!(request.engines.is_empty());
        assert_eq!(request.effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(SearchRequest::new("q").with_limit(3).effective_limit(), 3);
        assert_eq!(SearchRequest::new("q").with_limit(0).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(SearchRequest::new("q").with_limit(-5).effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_unique_engines_preserves_order() {
        let request =
            SearchRequest::new("q").with_engines(["bing", "baidu", "bing", " ", "sogou"]);
        assert_eq!(request.unique_engines(), vec!["bing", "baidu", "sogou"]);
    }

    #[test]
    fn test_search_request_deserialization_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query":"rust"}"#).unwrap();
        assert_eq!(request.query, "rust");
        assert!(request.limit.is_none());
        assert!(request.engines.is_empty());
    }

    #[test]
    fn test_search_request_deserialization_full() {
        let json = r#"{"query":"golang","limit":3,"engines":["duckduckgo"]}"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.effective_limit(), 3);
        assert_eq!(request.engines, vec!["duckduckgo"]);
    }

    #[test]
    fn test_search_request_serialization_skips_empty() {
        let json = serde_json::to_string(&SearchRequest::new("rust")).unwrap();
        assert_eq!(json, r#"{"query":"rust"}"#);
    }
}
