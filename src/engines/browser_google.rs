//! Google rendered in the shared browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{PageFetcher, PageRequest, WaitStrategy};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// Google host.
pub const DEFAULT_BASE_URL: &str = "https://www.google.com";

const PAGE_CAP: usize = 3;
const PAGINATION: Pagination = Pagination::Offset { first: 0, step: 10 };
const WAIT_SELECTOR: &str = "#search";
const WAIT_TIMEOUT_MS: u64 = 10_000;
const CHALLENGE_MARKERS: &[&str] = &["/sorry/", "unusual traffic from your computer", "g-recaptcha"];

const TITLE: &[Field] = &[Field::text("h3")];
const LINK: &[Field] = &[Field::href("a[href]")];
const DESCRIPTION: &[Field] = &[
    Field::text("div[data-sncf]"),
    Field::text("div.VwiC3b"),
    Field::text("span.aCOpRe"),
    Field::text("div.IsZvec"),
];
const SOURCE: &[Field] = &[Field::text("cite")];

static RULES: ExtractionRules = ExtractionRules {
    strategies: &[
        SelectorSet {
            container: "div.g",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
        SelectorSet {
            container: "div[data-ved]",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
        SelectorSet {
            container: "div.Gx5Zad",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
    ],
    link_resolver: LinkResolver::Google,
    internal_links: &["google.com", "webcache.googleusercontent.com"],
    ad_labels: &[],
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

/// Google search through a browser fetcher.
///
/// Tries several container layouts since Google's markup varies between
/// rollouts, unwraps `/url?q=` redirects and drops Google's own links.
pub struct BrowserGoogle {
    scraper: PagedScraper,
    base_url: String,
}

impl BrowserGoogle {
    /// Creates the engine over `fetcher`, normally a
    /// [`BrowserFetcher`](crate::BrowserFetcher).
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the Google host.
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

impl PageSource for BrowserGoogle {
    fn engine(&self) -> &str {
        "browser_google"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/search?q={}&start={}&hl=en",
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
impl Engine for BrowserGoogle {
    fn identifier(&self) -> &str {
        "browser_google"
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
