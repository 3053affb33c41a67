//! Search engine implementations.
//!
//! HTTP engines fetch server-rendered result pages through an
//! [`HttpFetcher`](crate::HttpFetcher); browser engines render pages in the
//! shared browser session through a [`BrowserFetcher`](crate::BrowserFetcher).
//! All of them page through results with a [`PagedScraper`](crate::PagedScraper).

// HTTP engines
mod baidu;
mod bing;
mod duckduckgo;
mod sogou;

// Browser engines
mod browser_baidu;
mod browser_bing;
mod browser_google;

pub use baidu::Baidu;
pub use bing::Bing;
pub use duckduckgo::DuckDuckGo;
pub use sogou::Sogou;

pub use browser_baidu::BrowserBaidu;
pub use browser_bing::BrowserBing;
pub use browser_google::BrowserGoogle;
