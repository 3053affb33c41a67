//! DuckDuckGo search engine implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{PageFetcher, PageRequest};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// Host of the HTML endpoint.
pub const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";
/// Host of the lite endpoint used as fallback.
pub const DEFAULT_LITE_URL: &str = "https://lite.duckduckgo.com";

const PAGE_CAP: usize = 3;
const PAGINATION: Pagination = Pagination::Offset { first: 0, step: 30 };
const CHALLENGE_MARKERS: &[&str] = &["anomaly-modal", "anomaly.js", "/anomaly"];

static HTML_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: ".result:not(.result--ad)",
        title: &[Field::text(".result__title")],
        link: &[Field::href(".result__a")],
        description: &[Field::text(".result__snippet")],
        source: &[Field::text(".result__url")],
    }],
    link_resolver: LinkResolver::DuckDuckGo,
    internal_links: &["duckduckgo.com/y.js"],
    ad_labels: &[],
    ad_markers: &[".badge--ad"],
    dedupe: true,
    link_scan: None,
};

static LITE_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: "tr",
        title: &[Field::text("a.result-link")],
        link: &[Field::href("a.result-link")],
        description: &[],
        source: &[],
    }],
    link_resolver: LinkResolver::DuckDuckGo,
    internal_links: &["duckduckgo.com/y.js"],
    ad_labels: &[],
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

/// DuckDuckGo search engine.
///
/// Scrapes the JavaScript-free HTML endpoint and falls back to the lite
/// endpoint when an anomaly page is served.
pub struct DuckDuckGo {
    scraper: PagedScraper,
    base_url: String,
    lite_url: String,
}

impl DuckDuckGo {
    /// Creates a new DuckDuckGo engine.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher),
            base_url: DEFAULT_BASE_URL.to_string(),
            lite_url: DEFAULT_LITE_URL.to_string(),
        }
    }

    /// Overrides the HTML and lite endpoint hosts.
    pub fn with_base_urls(mut self, base_url: impl Into<String>, lite_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.lite_url = lite_url.into();
        self
    }

    /// Sets the pause between consecutive pages.
    pub fn with_page_delay(mut self, delay: std::time::Duration) -> Self {
        self.scraper = self.scraper.with_page_delay(delay);
        self
    }
}

impl PageSource for DuckDuckGo {
    fn engine(&self) -> &str {
        "duckduckgo"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/html/?q={}&s={}",
            self.base_url,
            urlencoding::encode(query),
            PAGINATION.value(page)
        ))
    }

    fn fallback_request(&self, query: &str, page: usize) -> Option<PageRequest> {
        Some(PageRequest::new(format!(
            "{}/lite/?q={}&s={}",
            self.lite_url,
            urlencoding::encode(query),
            PAGINATION.value(page)
        )))
    }

    fn challenge_markers(&self) -> &[&str] {
        CHALLENGE_MARKERS
    }

    fn extract(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &HTML_RULES)
            .with_base(&self.base_url)?
            .extract(body)
    }

    fn extract_fallback(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &LITE_RULES)
            .with_base(&self.lite_url)?
            .extract(body)
    }
}

#[async_trait]
impl Engine for DuckDuckGo {
    fn identifier(&self) -> &str {
        "duckduckgo"
    }

    fn capability(&self) -> EngineCapability {
        EngineCapability::HttpOnly
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.scraper.collect(self, cancel, query, limit).await
    }
}
