//! Baidu rendered in the shared browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{PageFetcher, PageRequest, WaitStrategy};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// Desktop Baidu host.
pub const DEFAULT_BASE_URL: &str = "https://www.baidu.com";

const PAGE_CAP: usize = 3;
const PAGINATION: Pagination = Pagination::Offset { first: 0, step: 10 };
const WAIT_SELECTOR: &str = "#content_left";
const WAIT_TIMEOUT_MS: u64 = 10_000;
const CHALLENGE_MARKERS: &[&str] = &["wappass.baidu.com", "百度安全验证", "安全验证"];

static RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: "div.result, div.result-op, div.c-container",
        title: &[Field::text("h3 a"), Field::text("a[href]")],
        link: &[Field::href("h3 a"), Field::href("a[href]")],
        description: &[
            Field::text("div.c-abstract"),
            Field::text("span.c-abstract"),
            Field::text("div.c-span-last"),
            Field::text("div.content-right_8Zs40"),
        ],
        source: &[
            Field::text("span.c-showurl"),
            Field::text("a.c-showurl"),
            Field::text("span.source_1Vdff"),
        ],
    }],
    link_resolver: LinkResolver::Direct,
    internal_links: &[],
    ad_labels: &["广告"],
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

/// Baidu search through a browser fetcher.
pub struct BrowserBaidu {
    scraper: PagedScraper,
    base_url: String,
}

impl BrowserBaidu {
    /// Creates the engine over `fetcher`, normally a
    /// [`BrowserFetcher`](crate::BrowserFetcher).
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the Baidu host.
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

impl PageSource for BrowserBaidu {
    fn engine(&self) -> &str {
        "browser_baidu"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/s?wd={}&pn={}",
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
impl Engine for BrowserBaidu {
    fn identifier(&self) -> &str {
        "browser_baidu"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::CannedFetcher;

    const RENDERED_PAGE: &str = r#"
        <html><body><div id="content_left">
          <div class="result c-container new-pmd" id="1">
            <h3 class="t"><a href="http://www.baidu.com/link?url=one">Tokio 异步运行时</a></h3>
            <div class="c-abstract">Tokio 是 Rust 的异步运行时。</div>
            <span class="c-showurl">tokio.rs</span>
          </div>
          <div class="result-op c-container" id="2">
            <a href="http://www.baidu.com/link?url=two">Rust 异步编程</a>
            <div class="content-right_8Zs40">async/await 入门</div>
          </div>
          <div class="result c-container" id="3">
            <h3 class="t"><a href="http://www.baidu.com/link?url=three">Rust 培训 广告</a></h3>
          </div>
        </div></body></html>
    "#;

    #[test]
    fn test_page_request() {
        let engine = BrowserBaidu::new(Arc::new(CannedFetcher::default()));
        let request = engine.page_request("tokio", 1);
        assert_eq!(request.url, "https://www.baidu.com/s?wd=tokio&pn=10");
        assert!(
            matches!(request.wait, WaitStrategy::Selector { ref css, .. } if css == "#content_left")
        );
    }

    #[test]
    fn test_extract_rendered_page() {
        let engine = BrowserBaidu::new(Arc::new(CannedFetcher::default()));
        let results = engine.extract(RENDERED_PAGE).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Tokio 异步运行时");
        assert_eq!(results[0].description, "Tokio 是 Rust 的异步运行时。");
        assert_eq!(results[0].source, "tokio.rs");
        assert_eq!(results[1].title, "Rust 异步编程");
        assert_eq!(results[1].description, "async/await 入门");
        assert_eq!(results[1].source, "www.baidu.com");
        assert!(results.iter().all(|r| r.engine == "browser_baidu"));
    }

    #[tokio::test]
    async fn test_search_partial_results_on_later_error() {
        let fetcher = Arc::new(CannedFetcher::default().page(
            "https://www.baidu.com/s?wd=tokio&pn=0",
            200,
            RENDERED_PAGE,
        ));
        let results = BrowserBaidu::new(fetcher.clone())
            .search(&CancellationToken::new(), "tokio", 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            fetcher.urls(),
            vec![
                "https://www.baidu.com/s?wd=tokio&pn=0",
                "https://www.baidu.com/s?wd=tokio&pn=10"
            ]
        );
    }
}
