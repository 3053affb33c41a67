//! Sogou search engine implementation.
//!
//! The WAP site is scraped first since it is less aggressively guarded; the
//! desktop site serves as fallback when the anti-spider page shows up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{ClientProfile, PageFetcher, PageRequest};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// WAP Sogou host.
pub const DEFAULT_WAP_URL: &str = "https://wap.sogou.com";
/// Desktop Sogou host used as fallback.
pub const DEFAULT_DESKTOP_URL: &str = "https://www.sogou.com";
/// Default pause between pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);

const PAGE_CAP: usize = 5;
const PAGINATION: Pagination = Pagination::PageNumber { first: 1 };
const LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const CHALLENGE_MARKERS: &[&str] = &["antispider", "验证码"];
const AD_LABELS: &[&str] = &["广告", "推广"];

static WAP_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: ".vrResult",
        title: &[
            Field::text(".vr-tit a"),
            Field::text("h3 a"),
            Field::text(".major-title a"),
            Field::text("a.resultLink"),
        ],
        link: &[
            Field::href(".vr-tit a"),
            Field::href("h3 a"),
            Field::href(".major-title a"),
            Field::href("a.resultLink"),
        ],
        description: &[
            Field::text(".title-summary"),
            Field::text(".clamp2"),
            Field::text(".result-summary-exp"),
        ],
        source: &[Field::text(".citeurl span")],
    }],
    link_resolver: LinkResolver::QueryParam("url"),
    internal_links: &[
        "sogou.com/web/searchList",
        "sogou.com/link?",
        "sogou.com/tx?",
        "sogou.com/v?",
        "antispider",
    ],
    ad_labels: AD_LABELS,
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

static DESKTOP_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: ".vrwrap, .rb",
        title: &[Field::text("h3 a")],
        link: &[Field::href("h3 a")],
        description: &[
            Field::text(".str-text-info"),
            Field::text(".space-txt"),
            Field::text(".ft"),
        ],
        source: &[Field::text("cite")],
    }],
    link_resolver: LinkResolver::QueryParam("url"),
    internal_links: &["sogou.com/web?", "antispider"],
    ad_labels: AD_LABELS,
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

/// Sogou search engine over plain HTTP.
pub struct Sogou {
    scraper: PagedScraper,
    wap_url: String,
    desktop_url: String,
}

impl Sogou {
    /// Creates a new Sogou engine with the default 300 ms page delay.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher).with_page_delay(DEFAULT_PAGE_DELAY),
            wap_url: DEFAULT_WAP_URL.to_string(),
            desktop_url: DEFAULT_DESKTOP_URL.to_string(),
        }
    }

    /// Overrides the WAP and desktop hosts.
    pub fn with_base_urls(
        mut self,
        wap_url: impl Into<String>,
        desktop_url: impl Into<String>,
    ) -> Self {
        self.wap_url = wap_url.into();
        self.desktop_url = desktop_url.into();
        self
    }

    /// Sets the pause between consecutive pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.scraper = self.scraper.with_page_delay(delay);
        self
    }
}

impl PageSource for Sogou {
    fn engine(&self) -> &str {
        "sogou"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/web/searchList.jsp?keyword={}&page={}",
            self.wap_url,
            urlencoding::encode(query),
            PAGINATION.value(page)
        ))
        .with_profile(ClientProfile::Mobile)
        .with_language(LANGUAGE)
        .with_referer(format!("{}/", self.wap_url))
    }

    fn fallback_request(&self, query: &str, page: usize) -> Option<PageRequest> {
        Some(
            PageRequest::new(format!(
                "{}/web?query={}&page={}",
                self.desktop_url,
                urlencoding::encode(query),
                PAGINATION.value(page)
            ))
            .with_language(LANGUAGE),
        )
    }

    fn challenge_markers(&self) -> &[&str] {
        CHALLENGE_MARKERS
    }

    fn extract(&self, body: &str) -> Result<Vec<SearchResult>> {
        // Relative links on the WAP page are relative to /web/.
        ResultExtractor::new(self.engine(), &WAP_RULES)
            .with_base(&format!("{}/web/", self.wap_url))?
            .extract(body)
    }

    fn extract_fallback(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &DESKTOP_RULES)
            .with_base(&self.desktop_url)?
            .extract(body)
    }
}

#[async_trait]
impl Engine for Sogou {
    fn identifier(&self) -> &str {
        "sogou"
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
