//! HTTP-based page fetcher using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use crate::fetcher::{ClientProfile, FetchedPage, PageFetcher, PageRequest};
use crate::proxy::ProxyConfig;
use crate::Result;

/// Per-request timeout of the default client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DESKTOP_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,image/apng,*/*;q=0.8";
const MOBILE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A page fetcher that uses plain HTTP requests via reqwest.
///
/// The client keeps a cookie jar for as long as the fetcher lives, so one
/// fetcher per engine carries session cookies (warm-up tokens, challenge
/// cookies) across pages and also across searches, including concurrent
/// ones. Build a fetcher per search when cookies must not outlive it.
/// For engines that require JavaScript rendering, use `BrowserFetcher`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a fresh cookie jar and no proxy.
    pub fn new() -> Result<Self> {
        Self::with_proxy(None)
    }

    /// Creates a fetcher routed through `proxy` when given.
    pub fn with_proxy(proxy: Option<&ProxyConfig>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .brotli(true);
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Creates an `HttpFetcher` with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(USER_AGENT, request.profile.user_agent())
            .header(ACCEPT_LANGUAGE, request.accept_language);

        builder = match request.profile {
            ClientProfile::Desktop => builder
                .header(ACCEPT, DESKTOP_ACCEPT)
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache")
                .header("Sec-Fetch-Dest", "document")
                .header("Sec-Fetch-Mode", "navigate")
                .header("Sec-Fetch-Site", "none")
                .header("Sec-Fetch-User", "?1")
                .header("Upgrade-Insecure-Requests", "1"),
            ClientProfile::Mobile => builder.header(ACCEPT, MOBILE_ACCEPT),
        };

        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        debug!(
            "Fetched {} (status {}, {} bytes)",
            request.url,
            status,
            body.len()
        );

        Ok(FetchedPage {
            status,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_fetcher_new() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[test]
    fn test_http_fetcher_with_proxy() {
        let proxy = ProxyConfig::parse("socks5://127.0.0.1:1080").unwrap();
        assert!(HttpFetcher::with_proxy(Some(&proxy)).is_ok());
    }

    #[test]
    fn test_http_fetcher_with_client() {
        let client = Client::builder().user_agent("test-agent").build().unwrap();
        let _fetcher = HttpFetcher::with_client(client);
    }

    #[tokio::test]
    async fn test_fetch_sends_desktop_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header_regex("accept-language", "^zh-CN"))
            .and(header("sec-fetch-mode", "navigate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let request = PageRequest::new(format!("{}/search", server.uri()))
            .with_language("zh-CN,zh;q=0.9");
        let page = fetcher.fetch(&request).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>ok</html>");
        assert!(page.final_url.ends_with("/search"));
    }

    #[tokio::test]
    async fn test_fetch_sends_mobile_headers_and_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wap"))
            .and(header_regex("user-agent", "iPhone"))
            .and(header("referer", "https://wap.example.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("mobile"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let request = PageRequest::new(format!("{}/wap", server.uri()))
            .with_profile(ClientProfile::Mobile)
            .with_referer("https://wap.example.com/");
        let page = fetcher.fetch(&request).await.unwrap();
        assert_eq!(page.body, "mobile");
    }

    #[tokio::test]
    async fn test_fetch_returns_error_statuses_as_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let page = fetcher
            .fetch(&PageRequest::new(server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 429);
        assert!(!page.is_success());
    }

    #[tokio::test]
    async fn test_fetch_keeps_cookies_between_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "BAIDUID=abc; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s"))
            .and(header("cookie", "BAIDUID=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("with cookie"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        fetcher
            .fetch(&PageRequest::new(format!("{}/", server.uri())))
            .await
            .unwrap();
        let page = fetcher
            .fetch(&PageRequest::new(format!("{}/s", server.uri())))
            .await
            .unwrap();
        assert_eq!(page.body, "with cookie");
    }
}
