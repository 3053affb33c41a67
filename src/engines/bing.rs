//! Bing search engine implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, LinkScan, ResultExtractor, SelectorSet};
use crate::fetcher::{PageFetcher, PageRequest};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// International Bing host.
pub const DEFAULT_BASE_URL: &str = "https://www.bing.com";

const PAGE_CAP: usize = 5;
const PAGINATION: Pagination = Pagination::Offset { first: 1, step: 10 };
const CHALLENGE_MARKERS: &[&str] = &["/challenge/verify", "b_captcha", "turing/captcha"];

const TITLE: &[Field] = &[Field::text("h2")];
const LINK: &[Field] = &[Field::href("h2 a")];
const DESCRIPTION: &[Field] = &[
    Field::text(".b_caption p"),
    Field::text("p"),
    Field::text(".b_algoSlug"),
];
const SOURCE: &[Field] = &[Field::text("cite")];

static RULES: ExtractionRules = ExtractionRules {
    strategies: &[
        SelectorSet {
            container: "li.b_algo",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
        SelectorSet {
            container: "#b_results > li.b_algo",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
        SelectorSet {
            container: ".b_algo",
            title: TITLE,
            link: LINK,
            description: DESCRIPTION,
            source: SOURCE,
        },
    ],
    link_resolver: LinkResolver::Bing,
    internal_links: &[],
    ad_labels: &[],
    ad_markers: &[],
    dedupe: false,
    link_scan: Some(LinkScan {
        excluded_hosts: &["bing.com", "microsoft.com"],
        max_results: 10,
    }),
};

/// Bing search engine over plain HTTP.
pub struct Bing {
    scraper: PagedScraper,
    base_url: String,
}

impl Bing {
    /// Creates a new Bing engine.
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

impl PageSource for Bing {
    fn engine(&self) -> &str {
        "bing"
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
impl Engine for Bing {
    fn identifier(&self) -> &str {
        "bing"
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
