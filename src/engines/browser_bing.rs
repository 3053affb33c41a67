//! Bing rendered in the shared browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{PageFetcher, PageRequest, WaitStrategy};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// International Bing host.
pub const DEFAULT_BASE_URL: &str = "https://www.bing.com";

const PAGE_CAP: usize = 3;
const PAGINATION: Pagination = Pagination::Offset { first: 1, step: 10 };
const WAIT_SELECTOR: &str = "#b_results";
const WAIT_TIMEOUT_MS: u64 = 10_000;
const CHALLENGE_MARKERS: &[&str] = &["/challenge/verify", "b_captcha", "turing/captcha"];

static RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: "li.b_algo",
        title: &[Field::text("h2 a")],
        link: &[Field::href("h2 a")],
        description: &[Field::text(".b_caption p")],
        source: &[Field::text("cite")],
    }],
    link_resolver: LinkResolver::Bing,
    internal_links: &["bing.com", "microsoft.com"],
    ad_labels: &[],
    ad_markers: &[],
    dedupe: false,
    link_scan: None,
};

/// Bing search through a browser fetcher.
///
/// Decodes Bing's click-tracking redirects into target URLs.
pub struct BrowserBing {
    scraper: PagedScraper,
    base_url: String,
}

impl BrowserBing {
    /// Creates the engine over `fetcher`, normally a
    /// [`BrowserFetcher`](crate::BrowserFetcher).
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the Bing host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the pause between consecutive pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.scraper = self.scraper.with_page_delay(delay);
        self
    }
}

impl PageSource for BrowserBing {
    fn engine(&self) -> &str {
        "browser_bing"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/search?q={}&first={}&setlang=en",
            self.base_url,
            urlencoding::encode(query),
            PAGINATION.value(page)
        ))
        .with_wait(WaitStrategy::Selector {
            css: WAIT_SELECTOR.to_string(),
            timeout_ms: WAIT_TIMEOUT_MS,
        })
    }

    fn challenge_markers(&self) -> &[&str] {
        CHALLENGE_MARKERS
    }

    fn extract(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &RULES)
            .with_base(&self.base_url)?
            .extract(body)
    }
}

#[async_trait]
impl Engine for BrowserBing {
    fn identifier(&self) -> &str {
        "browser_bing"
    }

    fn capability(&self) -> EngineCapability {
        EngineCapability::BrowserDriven
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
