//! Page fetcher abstraction for retrieving HTML content.

use async_trait::async_trait;

use crate::Result;

/// Desktop Chrome user agent shared by the HTTP client and the browser.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Mobile Safari user agent used by mobile page variants.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Browser the request should look like it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientProfile {
    /// Desktop Chrome.
    #[default]
    Desktop,
    /// Mobile Safari.
    Mobile,
}

impl ClientProfile {
    /// User agent string for this profile.
    pub fn user_agent(&self) -> &'static str {
        match self {
            ClientProfile::Desktop => DESKTOP_USER_AGENT,
            ClientProfile::Mobile => MOBILE_USER_AGENT,
        }
    }
}

/// Strategy for waiting until a page is considered fully loaded.
///
/// Only browser fetchers act on this; plain HTTP responses are complete
/// once the body has been read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Wait for the page load event only.
    #[default]
    Load,
    /// Wait until a CSS selector matches an element on the page.
    Selector {
        /// CSS selector to wait for.
        css: String,
        /// Maximum time to wait in milliseconds before timing out.
        timeout_ms: u64,
    },
    /// Wait a fixed delay after the page load event.
    Delay {
        /// Milliseconds to wait after page load.
        ms: u64,
    },
}

/// A single page request issued by a scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Absolute URL to fetch.
    pub url: String,
    /// Header profile to present.
    pub profile: ClientProfile,
    /// `Accept-Language` header value.
    pub accept_language: &'static str,
    /// Optional `Referer` header.
    pub referer: Option<String>,
    /// Load condition for browser fetchers.
    pub wait: WaitStrategy,
}

impl PageRequest {
    /// Desktop request for `url` with English language preference.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            profile: ClientProfile::Desktop,
            accept_language: "en-US,en;q=0.9",
            referer: None,
            wait: WaitStrategy::Load,
        }
    }

    /// Sets the header profile.
    pub fn with_profile(mut self, profile: ClientProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the `Accept-Language` header.
    pub fn with_language(mut self, accept_language: &'static str) -> Self {
        self.accept_language = accept_language;
        self
    }

    /// Sets the `Referer` header.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets the browser wait strategy.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }
}

/// A fetched page: status, post-redirect URL and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status. Browser fetchers report 200 for rendered pages.
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    /// Response body or rendered markup.
    pub body: String,
}

impl FetchedPage {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching the full HTML content of a page.
///
/// Implementations may use plain HTTP requests or a headless browser.
/// Non-success statuses are returned as pages, not errors, so callers can
/// tell challenges apart from transport failures.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the page described by `request`.
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage>;
}
