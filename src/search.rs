//! Search orchestration.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserBackend, BrowserFetcher, BrowserSessionManager, LaunchOptions};
use crate::engine::until_cancelled;
use crate::engines::{Baidu, Bing, BrowserBaidu, BrowserBing, BrowserGoogle, DuckDuckGo, Sogou};
use crate::fetcher::PageFetcher;
use crate::fetcher_http::HttpFetcher;
use crate::proxy::ProxyConfig;
use crate::{
    Engine, EngineDescriptor, Result, SearchError, SearchRequest, SearchResult, SearchSettings,
};

/// How long an engine may keep running after its time bound cancelled it.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Runs one engine under the caller's token and a wall-clock bound.
///
/// When the bound passes, the engine's own token is cancelled so it can
/// stop and hand back the results it already has. An engine that ends up
/// with nothing, or does not stop within [`TIMEOUT_GRACE`], fails with
/// [`SearchError::Timeout`]. A caller cancellation yields
/// [`SearchError::Cancelled`] and discards partial work.
async fn run_bounded(
    engine: &dyn Engine,
    cancel: &CancellationToken,
    bound: Duration,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let engine_cancel = cancel.child_token();
    let search = until_cancelled(cancel, engine.search(&engine_cancel, query, limit));
    tokio::pin!(search);

    tokio::select! {
        outcome = &mut search => outcome,
        _ = tokio::time::sleep(bound) => {
            warn!("Engine {} exceeded {:?}, stopping it", engine.identifier(), bound);
            engine_cancel.cancel();
            match timeout(TIMEOUT_GRACE, search).await {
                Ok(Err(e)) if e.is_cancelled() && !cancel.is_cancelled() => Err(SearchError::Timeout),
                Ok(outcome) => outcome,
                Err(_) => Err(SearchError::Timeout),
            }
        }
    }
}

/// Fans a request out to the registered engines and merges their results.
///
/// The registry maps engine identifiers to instances. It is filled at
/// startup and read concurrently afterwards.
pub struct SearchCoordinator {
    settings: SearchSettings,
    engines: RwLock<HashMap<String, Arc<dyn Engine>>>,
    browser: Option<Arc<BrowserSessionManager>>,
}

impl SearchCoordinator {
    /// Creates a coordinator with an empty registry.
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings: settings.validate(),
            engines: RwLock::new(HashMap::new()),
            browser: None,
        }
    }

    /// Creates a coordinator and registers every engine the settings enable.
    ///
    /// HTTP engines get their own cookie jar each, kept for the life of the
    /// coordinator and shared by all of that engine's searches. Browser
    /// engines share one browser session, launched on first use.
    pub fn from_settings(settings: SearchSettings) -> Result<Self> {
        let mut coordinator = Self::new(settings);
        coordinator.settings.log_summary();

        let proxy = coordinator
            .settings
            .proxy_url()
            .map(ProxyConfig::parse)
            .transpose()?;
        let http = || -> Result<Arc<dyn PageFetcher>> {
            Ok(Arc::new(HttpFetcher::with_proxy(proxy.as_ref())?))
        };

        coordinator.register(Arc::new(Bing::new(http()?)));
        coordinator.register(Arc::new(DuckDuckGo::new(http()?)));
        coordinator.register(Arc::new(Baidu::new(http()?)));
        coordinator.register(Arc::new(Sogou::new(http()?)));

        #[cfg(feature = "headless")]
        if coordinator.settings.browser.enabled {
            coordinator.register_browser_engines(
                Arc::new(crate::browser_chromium::ChromiumBackend),
                proxy,
            );
        }

        Ok(coordinator)
    }

    /// Registers the browser-driven engines over one session on `backend`.
    pub fn register_browser_engines(
        &mut self,
        backend: Arc<dyn BrowserBackend>,
        proxy: Option<ProxyConfig>,
    ) {
        let session = Arc::new(BrowserSessionManager::new(backend));
        let options = LaunchOptions {
            headless: self.settings.browser.headless,
            executable: self.settings.browser.executable.clone(),
            proxy,
            ..LaunchOptions::default()
        };
        let fetcher: Arc<dyn PageFetcher> = Arc::new(
            BrowserFetcher::new(Arc::clone(&session), options)
                .with_tab_timeout(self.settings.browser.tab_timeout())
                .with_max_attempts(self.settings.browser.max_attempts),
        );

        self.register(Arc::new(BrowserBing::new(Arc::clone(&fetcher))));
        self.register(Arc::new(BrowserGoogle::new(Arc::clone(&fetcher))));
        self.register(Arc::new(BrowserBaidu::new(fetcher)));
        self.browser = Some(session);
    }

    /// Returns the validated settings.
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Adds `engine` under its identifier, replacing any previous entry.
    pub fn register(&self, engine: Arc<dyn Engine>) {
        let id = engine.identifier().to_string();
        info!("Registered engine {} ({:?})", id, engine.capability());
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, engine);
    }

    /// Looks up a registered engine.
    pub fn engine(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Identifiers of all registered engines, sorted.
    pub fn engine_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Descriptors of all registered engines, sorted by identifier.
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        let mut descriptors: Vec<_> = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|engine| engine.descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        descriptors
    }

    /// Performs a search.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.search_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Performs a search that stops once `cancel` fires.
    ///
    /// Every selected engine runs to completion or failure independently.
    /// Results are returned whenever any engine produced some; an error is
    /// returned only when the combined result set is empty.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }
        let limit = request.effective_limit();

        let selected = self.select_engines(request);
        if selected.is_empty() {
            debug!("No engine selected for query '{}'", query);
            return Ok(Vec::new());
        }
        debug!("Searching {} engines", selected.len());

        let engine_timeout = self.settings.engine_timeout();
        let mut pending: FuturesUnordered<_> = selected
            .into_iter()
            .map(|engine| async move {
                let outcome =
                    run_bounded(engine.as_ref(), cancel, engine_timeout, query, limit).await;
                (engine.identifier().to_string(), outcome)
            })
            .collect();

        let mut results = Vec::new();
        let mut last_error = None;
        while let Some((id, outcome)) = pending.next().await {
            match outcome {
                Ok(batch) => {
                    debug!("Engine {} returned {} results", id, batch.len());
                    results.extend(batch.into_iter().take(limit));
                }
                Err(e) if e.is_cancelled() => debug!("Engine {} cancelled", id),
                Err(e) => {
                    warn!("Engine {} failed: {}", id, e);
                    last_error = Some(e);
                }
            }
        }

        if !results.is_empty() {
            info!("Search '{}' returned {} results", query, results.len());
            return Ok(results);
        }
        match last_error {
            Some(e) => Err(SearchError::AllEnginesFailed(Box::new(e))),
            None if cancel.is_cancelled() => Err(SearchError::Cancelled),
            None => Ok(results),
        }
    }

    /// Resolves the request's engines against the allow-list and registry.
    fn select_engines(&self, request: &SearchRequest) -> Vec<Arc<dyn Engine>> {
        let requested = request.unique_engines();
        let names = if requested.is_empty() {
            vec![self.settings.default_engine.as_str()]
        } else {
            requested
        };

        names
            .into_iter()
            .filter_map(|name| {
                if !self.settings.is_engine_allowed(name) {
                    warn!("Skipping engine: {}", SearchError::ConfigRejected(name.to_string()));
                    return None;
                }
                let engine = self.engine(name);
                if engine.is_none() {
                    warn!("Skipping engine {}: not registered", name);
                }
                engine
            })
            .collect()
    }

    /// Shuts down the shared browser session, if any.
    pub async fn shutdown(&self) {
        if let Some(session) = &self.browser {
            session.shutdown().await;
        }
    }
}
