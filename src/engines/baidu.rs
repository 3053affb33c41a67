//! Baidu search engine implementation.
//!
//! Baidu guards its desktop results with a verification page. The engine
//! warms up a cookie session on the home page first, and when a page is
//! challenged it retries once through the mobile site with mobile headers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionRules, Field, LinkResolver, ResultExtractor, SelectorSet};
use crate::fetcher::{ClientProfile, PageFetcher, PageRequest};
use crate::paged::{PageSource, PagedScraper, Pagination};
use crate::{Engine, EngineCapability, Result, SearchResult};

/// Desktop Baidu host.
pub const DEFAULT_BASE_URL: &str = "https://www.baidu.com";
/// Mobile Baidu host used as fallback.
pub const DEFAULT_MOBILE_URL: &str = "https://m.baidu.com";
/// Default pause between pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

const PAGE_CAP: usize = 5;
const PAGINATION: Pagination = Pagination::Offset { first: 0, step: 10 };
const DESKTOP_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const MOBILE_LANGUAGE: &str = "zh-CN,zh;q=0.9";
const CHALLENGE_MARKERS: &[&str] = &["wappass.baidu.com", "百度安全验证", "安全验证"];
const INTERNAL_LINKS: &[&str] = &["baidu.com/s?", "baidu.com/baidu.php"];
const AD_LABELS: &[&str] = &["广告", "推广", "想在此推广"];

static DESKTOP_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: "#content_left > *",
        title: &[Field::text("h3")],
        link: &[Field::href("h3 a"), Field::href("a")],
        description: &[
            Field::attr(".c-font-normal.c-color-text", "aria-label"),
            Field::text(".c-font-normal.c-color-text"),
            Field::text(".cos-row"),
            Field::text(".c-abstract"),
        ],
        source: &[Field::text(".cosc-source")],
    }],
    link_resolver: LinkResolver::Direct,
    internal_links: INTERNAL_LINKS,
    ad_labels: AD_LABELS,
    ad_markers: &[],
    dedupe: false,
    link_scan: None,
};

static MOBILE_RULES: ExtractionRules = ExtractionRules {
    strategies: &[SelectorSet {
        container: ".c-result, .result, [data-log]",
        title: &[Field::text(".c-title, .c-title-text, h3")],
        link: &[Field::href("a")],
        description: &[Field::text(".c-abstract, .c-span-last, .c-line-clamp2")],
        source: &[Field::text(".c-showurl, .c-color-source")],
    }],
    link_resolver: LinkResolver::Direct,
    internal_links: INTERNAL_LINKS,
    ad_labels: AD_LABELS,
    ad_markers: &[],
    dedupe: true,
    link_scan: None,
};

/// Baidu search engine over plain HTTP.
pub struct Baidu {
    scraper: PagedScraper,
    base_url: String,
    mobile_url: String,
}

impl Baidu {
    /// Creates a new Baidu engine with the default 500 ms page delay.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scraper: PagedScraper::new(fetcher).with_page_delay(DEFAULT_PAGE_DELAY),
            base_url: DEFAULT_BASE_URL.to_string(),
            mobile_url: DEFAULT_MOBILE_URL.to_string(),
        }
    }

    /// Overrides the desktop and mobile hosts.
    pub fn with_base_urls(
        mut self,
        base_url: impl Into<String>,
        mobile_url: impl Into<String>,
    ) -> Self {
        self.base_url = base_url.into();
        self.mobile_url = mobile_url.into();
        self
    }

    /// Sets the pause between consecutive pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.scraper = self.scraper.with_page_delay(delay);
        self
    }
}

impl PageSource for Baidu {
    fn engine(&self) -> &str {
        "baidu"
    }

    fn page_cap(&self) -> usize {
        PAGE_CAP
    }

    fn warmup_request(&self) -> Option<PageRequest> {
        Some(PageRequest::new(format!("{}/", self.base_url)).with_language(DESKTOP_LANGUAGE))
    }

    fn page_request(&self, query: &str, page: usize) -> PageRequest {
        PageRequest::new(format!(
            "{}/s?wd={}&pn={}&ie=utf-8",
            self.base_url,
            urlencoding::encode(query),
            PAGINATION.value(page)
        ))
        .with_language(DESKTOP_LANGUAGE)
        .with_referer(format!("{}/", self.base_url))
    }

    fn fallback_request(&self, query: &str, page: usize) -> Option<PageRequest> {
        Some(
            PageRequest::new(format!(
                "{}/s?word={}&pn={}",
                self.mobile_url,
                urlencoding::encode(query),
                PAGINATION.value(page)
            ))
            .with_profile(ClientProfile::Mobile)
            .with_language(MOBILE_LANGUAGE),
        )
    }

    fn challenge_markers(&self) -> &[&str] {
        CHALLENGE_MARKERS
    }

    fn extract(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &DESKTOP_RULES)
            .with_base(&self.base_url)?
            .extract(body)
    }

    fn extract_fallback(&self, body: &str) -> Result<Vec<SearchResult>> {
        ResultExtractor::new(self.engine(), &MOBILE_RULES)
            .with_base(&self.mobile_url)?
            .extract(body)
    }
}

#[async_trait]
impl Engine for Baidu {
    fn identifier(&self) -> &str {
        "baidu"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::CannedFetcher;
    use crate::SearchError;

    const DESKTOP_PAGE: &str = r#"
        <html><body><div id="content_left">
          <div class="result c-container" tpl="se_com_default">
            <h3 class="t"><a href="http://www.baidu.com/link?url=abc123">Rust 程序设计语言</a></h3>
            <span class="c-font-normal c-color-text" aria-label="一门赋予每个人构建可靠且高效软件能力的语言。">摘要</span>
            <span class="cosc-source">rust-lang.org</span>
          </div>
          <div class="result c-container">
            <h3 class="t"><a href="http://www.baidu.com/link?url=def456">Rust 中文社区</a></h3>
            <div class="cos-row">Rust 语言中文社区，学习交流平台。</div>
          </div>
          <div class="result c-container">
            <h3 class="t"><a href="https://www.baidu.com/baidu.php?url=ad">Rust 培训</a></h3>
          </div>
          <div class="result c-container">
            <h3 class="t"><a href="http://www.baidu.com/link?url=ghi">Rust 课程 广告</a></h3>
          </div>
          <div id="rs">
            <h3>相关搜索</h3>
            <a href="/s?wd=rust%E6%95%99%E7%A8%8B">rust教程</a>
          </div>
        </div></body></html>
    "#;

    const MOBILE_PAGE: &str = r#"
        <html><body>
          <div class="c-result result" data-log="{}">
            <a href="https://m.rust-lang.org/zh-CN/"><span class="c-title">Rust 官网</span></a>
            <div class="c-abstract">Rust 程序设计语言官方网站</div>
            <span class="c-showurl">rust-lang.org</span>
          </div>
          <div class="c-result result">
            <a href="/s?word=rust+%E7%9B%B8%E5%85%B3"><span class="c-title">相关搜索</span></a>
          </div>
        </body></html>
    "#;

    const VERIFY_PAGE: &str =
        r#"<html><head><title>百度安全验证</title></head><body>网络不给力，请稍后重试</body></html>"#;

    fn engine(fetcher: Arc<CannedFetcher>) -> Baidu {
        Baidu::new(fetcher).with_page_delay(Duration::ZERO)
    }

    #[test]
    fn test_requests() {
        let engine = engine(Arc::new(CannedFetcher::default()));

        let warmup = engine.warmup_request().unwrap();
        assert_eq!(warmup.url, "https://www.baidu.com/");
        assert_eq!(warmup.accept_language, DESKTOP_LANGUAGE);

        let page = engine.page_request("rust 教程", 2);
        assert_eq!(
            page.url,
            "https://www.baidu.com/s?wd=rust%20%E6%95%99%E7%A8%8B&pn=20&ie=utf-8"
        );
        assert_eq!(page.profile, ClientProfile::Desktop);

        let fallback = engine.fallback_request("rust", 1).unwrap();
        assert_eq!(fallback.url, "https://m.baidu.com/s?word=rust&pn=10");
        assert_eq!(fallback.profile, ClientProfile::Mobile);
        assert_eq!(fallback.accept_language, MOBILE_LANGUAGE);
    }

    #[test]
    fn test_default_page_delay() {
        let baidu = Baidu::new(Arc::new(CannedFetcher::default()));
        assert_eq!(baidu.scraper.page_delay(), DEFAULT_PAGE_DELAY);
    }

    #[test]
    fn test_extract_desktop_filters_internal_and_ads() {
        let engine = engine(Arc::new(CannedFetcher::default()));
        let results = engine.extract(DESKTOP_PAGE).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust 程序设计语言");
        assert_eq!(results[0].url, "http://www.baidu.com/link?url=abc123");
        assert_eq!(
            results[0].description,
            "一门赋予每个人构建可靠且高效软件能力的语言。"
        );
        assert_eq!(results[0].source, "rust-lang.org");
        assert_eq!(results[1].description, "Rust 语言中文社区，学习交流平台。");
        assert_eq!(results[1].source, "www.baidu.com");
    }

    #[test]
    fn test_extract_mobile_resolves_relative_links() {
        let engine = engine(Arc::new(CannedFetcher::default()));
        let results = engine.extract_fallback(MOBILE_PAGE).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Rust 官网");
        assert_eq!(results[0].url, "https://m.rust-lang.org/zh-CN/");
        assert_eq!(results[0].description, "Rust 程序设计语言官方网站");
        assert_eq!(results[0].source, "rust-lang.org");
    }

    #[tokio::test]
    async fn test_search_uses_mobile_fallback_on_verification() {
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page("https://www.baidu.com/", 200, "<html>home</html>")
                .page("https://www.baidu.com/s?wd=rust&pn=0&ie=utf-8", 200, VERIFY_PAGE)
                .page("https://m.baidu.com/s?word=rust&pn=0", 200, MOBILE_PAGE)
                .page("https://www.baidu.com/s?wd=rust&pn=10&ie=utf-8", 200, DESKTOP_PAGE)
                .page("https://www.baidu.com/s?wd=rust&pn=20&ie=utf-8", 200, "<html></html>"),
        );
        let results = engine(fetcher.clone())
            .search(&CancellationToken::new(), "rust", 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].url, "https://m.rust-lang.org/zh-CN/");
        assert_eq!(
            fetcher.urls(),
            vec![
                "https://www.baidu.com/",
                "https://www.baidu.com/s?wd=rust&pn=0&ie=utf-8",
                "https://m.baidu.com/s?word=rust&pn=0",
                "https://www.baidu.com/s?wd=rust&pn=10&ie=utf-8",
                "https://www.baidu.com/s?wd=rust&pn=20&ie=utf-8",
            ]
        );
    }

    #[tokio::test]
    async fn test_search_blocked_when_both_variants_challenged() {
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page("https://www.baidu.com/s?wd=rust&pn=0&ie=utf-8", 200, VERIFY_PAGE)
                .page("https://m.baidu.com/s?word=rust&pn=0", 200, VERIFY_PAGE),
        );
        let err = engine(fetcher)
            .search(&CancellationToken::new(), "rust", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Blocked(ref e) if e == "baidu"));
    }
}
