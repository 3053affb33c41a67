//! Page-by-page scraping with challenge detection and fallback.
//!
//! [`PagedScraper`] drives every paginated engine: it fetches pages strictly
//! in sequence, classifies each page as a challenge or a results page,
//! tries the engine's fallback variant once per challenge, and stops on
//! exhaustion, limit, page cap, block or error.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::until_cancelled;
use crate::fetcher::{FetchedPage, PageFetcher, PageRequest};
use crate::{Result, SearchError, SearchResult};

/// How an engine numbers its result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Result offset: `first + step * page`.
    Offset {
        /// Offset of the first page.
        first: usize,
        /// Results per page.
        step: usize,
    },
    /// Page number: `first + page`.
    PageNumber {
        /// Number of the first page.
        first: usize,
    },
}

impl Pagination {
    /// Parameter value for the zero-based `page`.
    pub fn value(&self, page: usize) -> usize {
        match *self {
            Pagination::Offset { first, step } => first + step * page,
            Pagination::PageNumber { first } => first + page,
        }
    }
}

/// Engine-specific half of the paged scrape: URLs, markers and extraction.
pub trait PageSource: Send + Sync {
    /// Engine identifier, used for logging and the blocked error.
    fn engine(&self) -> &str;

    /// Maximum number of pages fetched per search.
    fn page_cap(&self) -> usize;

    /// Request for the zero-based result `page`.
    fn page_request(&self, query: &str, page: usize) -> PageRequest;

    /// Alternate rendering tried once when `page` is challenged.
    fn fallback_request(&self, _query: &str, _page: usize) -> Option<PageRequest> {
        None
    }

    /// Request issued once before the first page, e.g. to collect cookies.
    fn warmup_request(&self) -> Option<PageRequest> {
        None
    }

    /// Body or URL fragments that identify a challenge page.
    fn challenge_markers(&self) -> &[&str] {
        &[]
    }

    /// Extracts results from a primary page.
    fn extract(&self, body: &str) -> Result<Vec<SearchResult>>;

    /// Extracts results from a fallback page.
    fn extract_fallback(&self, body: &str) -> Result<Vec<SearchResult>> {
        self.extract(body)
    }
}

/// Why a scrape stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A page produced no results.
    Exhausted,
    /// The limit was reached; results were truncated to it.
    LimitReached,
    /// The engine's page cap was reached.
    PageCapReached,
    /// A challenge could not be bypassed after results were collected.
    Blocked,
    /// A later page failed after results were collected.
    PartialOnError,
    /// The caller cancelled after results were collected.
    Cancelled,
}

/// Result of a scrape that produced an outcome rather than an error.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// Collected results, at most `limit`.
    pub results: Vec<SearchResult>,
    /// Why the loop stopped.
    pub termination: Termination,
    /// Number of pages that contributed results.
    pub pages_fetched: usize,
}

enum PageOutcome {
    Results(Vec<SearchResult>),
    Blocked,
}

/// Returns `true` for challenge pages and an error for other failures.
pub fn is_challenge(page: &FetchedPage, markers: &[&str]) -> Result<bool> {
    if matches!(page.status, 403 | 429) {
        return Ok(true);
    }
    if markers
        .iter()
        .any(|m| page.body.contains(m) || page.final_url.contains(m))
    {
        return Ok(true);
    }
    if !page.is_success() {
        return Err(SearchError::Status {
            status: page.status,
        });
    }
    Ok(false)
}

/// Sequential page scraper shared by the HTTP engines.
pub struct PagedScraper {
    fetcher: Arc<dyn PageFetcher>,
    page_delay: Duration,
}

impl PagedScraper {
    /// Creates a scraper with no inter-page delay.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            page_delay: Duration::ZERO,
        }
    }

    /// Sets the pause between consecutive pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Returns the configured inter-page delay.
    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    /// Scrapes up to `limit` results and returns only the results.
    pub async fn collect(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.run(source, cancel, query, limit).await?.results)
    }

    /// Scrapes up to `limit` results.
    ///
    /// Errors are returned only when nothing was collected; later failures
    /// end the loop and return what was gathered so far.
    pub async fn run(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<ScrapeOutcome> {
        let engine = source.engine();

        if let Some(warmup) = source.warmup_request() {
            match until_cancelled(cancel, self.fetcher.fetch(&warmup)).await {
                Ok(_) => debug!("{}: warmup completed, cookies established", engine),
                Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
                Err(e) => warn!("{}: warmup failed: {}", engine, e),
            }
        }

        let mut results: Vec<SearchResult> = Vec::new();
        let mut page = 0;
        let termination = loop {
            if results.len() >= limit {
                break Termination::LimitReached;
            }
            if page >= source.page_cap() {
                break Termination::PageCapReached;
            }
            if page > 0 && !self.page_delay.is_zero() {
                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(self.page_delay) => false,
                };
                if cancelled {
                    break Termination::Cancelled;
                }
            }

            match self.fetch_page(source, cancel, query, page).await {
                Ok(PageOutcome::Results(batch)) if batch.is_empty() => {
                    info!("{}: no more results at page {}, ending early", engine, page);
                    break Termination::Exhausted;
                }
                Ok(PageOutcome::Results(batch)) => {
                    debug!("{}: page {} found {} results", engine, page, batch.len());
                    results.extend(batch);
                    page += 1;
                }
                Ok(PageOutcome::Blocked) => break Termination::Blocked,
                Err(SearchError::Cancelled) => break Termination::Cancelled,
                Err(e) if !results.is_empty() => {
                    warn!(
                        "{}: error on page {}, returning {} results collected so far: {}",
                        engine,
                        page,
                        results.len(),
                        e
                    );
                    break Termination::PartialOnError;
                }
                Err(e) => return Err(e),
            }
        };

        if results.is_empty() {
            match termination {
                Termination::Blocked => return Err(SearchError::Blocked(engine.to_string())),
                Termination::Cancelled => return Err(SearchError::Cancelled),
                _ => {}
            }
        }

        results.truncate(limit);
        info!(
            "{}: found {} results for query '{}' ({:?})",
            engine,
            results.len(),
            query,
            termination
        );

        Ok(ScrapeOutcome {
            results,
            termination,
            pages_fetched: page,
        })
    }

    async fn fetch_page(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
        query: &str,
        page: usize,
    ) -> Result<PageOutcome> {
        let engine = source.engine();
        let request = source.page_request(query, page);
        let fetched = until_cancelled(cancel, self.fetcher.fetch(&request)).await?;

        if !is_challenge(&fetched, source.challenge_markers())? {
            return source.extract(&fetched.body).map(PageOutcome::Results);
        }

        warn!("{}: challenge page detected on page {}", engine, page);
        let Some(fallback) = source.fallback_request(query, page) else {
            return Ok(PageOutcome::Blocked);
        };

        info!("{}: trying fallback {}", engine, fallback.url);
        let fetched = match until_cancelled(cancel, self.fetcher.fetch(&fallback)).await {
            Ok(fetched) => fetched,
            Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
            Err(e) => {
                warn!("{}: fallback request failed: {}", engine, e);
                return Ok(PageOutcome::Blocked);
            }
        };

        match is_challenge(&fetched, source.challenge_markers()) {
            Ok(false) => {}
            Ok(true) => {
                warn!("{}: fallback also served a challenge", engine);
                return Ok(PageOutcome::Blocked);
            }
            Err(e) => {
                warn!("{}: fallback failed: {}", engine, e);
                return Ok(PageOutcome::Blocked);
            }
        }

        let results = source.extract_fallback(&fetched.body)?;
        if results.is_empty() {
            warn!("{}: fallback produced no results", engine);
            return Ok(PageOutcome::Blocked);
        }
        Ok(PageOutcome::Results(results))
    }
}
