//! # multisearch
//!
//! Multi-engine web search over scraped result pages.
//!
//! A [`SearchCoordinator`] fans one request out to several engines in
//! parallel and merges whatever comes back. Engines fall into two groups:
//!
//! - HTTP engines (Bing, DuckDuckGo, Baidu, Sogou) fetch server-rendered
//!   markup over plain HTTP, each with its own cookie jar
//! - Browser engines (`browser_bing`, `browser_google`, `browser_baidu`)
//!   render pages in one lazily launched, shared headless browser
//!
//! Failures stay inside the engine that hit them: a blocked or timed-out
//! engine contributes nothing, and an error surfaces only when no engine
//! produced a single result.
//!
//! ## Example
//!
//! ```rust,no_run
//! use multisearch::{SearchCoordinator, SearchRequest, SearchSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let search = SearchCoordinator::from_settings(SearchSettings::default())?;
//!
//!     let request = SearchRequest::new("rust programming")
//!         .with_engines(["duckduckgo", "bing"])
//!         .with_limit(5);
//!     for result in search.search(&request).await? {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!
//!     search.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod query;
mod result;
mod search;

pub mod browser;
#[cfg(feature = "headless")]
pub mod browser_chromium;
#[cfg(feature = "headless")]
pub mod browser_setup;
pub mod engines;
pub mod extract;
pub mod fetcher;
pub mod fetcher_http;
pub mod paged;
pub mod proxy;

pub use browser::{BrowserFetcher, BrowserSessionManager, LaunchOptions, SessionState};
#[cfg(feature = "headless")]
pub use browser_chromium::ChromiumBackend;
#[cfg(feature = "headless")]
pub use browser_setup::{detect_chrome, find_chrome};
pub use config::{
    is_known_engine, BrowserSettings, ProxySettings, SearchSettings, FALLBACK_ENGINE,
    KNOWN_ENGINES,
};
pub use engine::{Engine, EngineCapability, EngineDescriptor};
pub use error::{Result, SearchError};
pub use fetcher::{ClientProfile, FetchedPage, PageFetcher, PageRequest, WaitStrategy};
pub use fetcher_http::HttpFetcher;
pub use paged::{PageSource, PagedScraper};
pub use proxy::{ProxyConfig, ProxyProtocol};
pub use query::{SearchRequest, DEFAULT_LIMIT};
pub use result::SearchResult;
pub use search::SearchCoordinator;
