//! Shared automation-browser session for JavaScript-rendered engines.
//!
//! [`BrowserSessionManager`] owns one browser process behind the
//! [`BrowserBackend`] seam. It is launched lazily and exactly once even when
//! many engines ask for it at the same time, hands out short-lived tabs as
//! [`TabLease`]s, and can be shut down and re-initialized. [`BrowserFetcher`]
//! adapts the session to the [`PageFetcher`] interface used by the scrapers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetcher::{FetchedPage, PageFetcher, PageRequest, WaitStrategy, DESKTOP_USER_AGENT};
use crate::proxy::ProxyConfig;
use crate::{Result, SearchError};

/// Default pause before the second attempt; later attempts wait proportionally longer.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Flags that hide automation indicators and keep the process lean.
pub const EVASION_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--no-first-run",
    "--mute-audio",
];

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight / 2)";

/// How the browser process is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a window.
    pub headless: bool,
    /// Explicit executable; discovered when `None`.
    pub executable: Option<PathBuf>,
    /// Upstream proxy for all browser traffic.
    pub proxy: Option<ProxyConfig>,
    /// Window size in pixels.
    pub window: (u32, u32),
    /// User agent presented by every tab.
    pub user_agent: String,
    /// Additional command-line arguments.
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            proxy: None,
            window: (1920, 1080),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Command-line arguments for a Chromium-family browser.
    ///
    /// Headless mode is not among them; backends select it through their
    /// launcher so the flag is never passed twice.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        args.push(format!("--window-size={},{}", self.window.0, self.window.1));
        args.push(format!("--user-agent={}", self.user_agent));
        args.extend(EVASION_FLAGS.iter().map(|flag| flag.to_string()));
        args.push("--lang=en-US".to_string());
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy-server={}", proxy.server()));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Launches browser processes.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Starts a browser. Fails with [`SearchError::ResourceUnavailable`] when
    /// no executable can be found or the process does not start.
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// One round-trip confirming the process answers.
    async fn warm_up(&self) -> Result<()>;

    /// Opens a fresh tab.
    async fn open_tab(&self) -> Result<Box<dyn BrowserTab>>;

    /// Terminates the process.
    async fn close(&self) -> Result<()>;
}

/// A single browser tab.
#[async_trait]
pub trait BrowserTab: Send + Sync {
    /// Navigates to `url` and waits for the load event.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Waits up to `timeout` for `css` to match; `false` when it never did.
    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool>;

    /// Evaluates a script for its side effects.
    async fn evaluate(&self, script: &str) -> Result<()>;

    /// URL currently shown.
    async fn current_url(&self) -> Result<String>;

    /// Rendered markup of the document.
    async fn content(&self) -> Result<String>;

    /// Closes the tab.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Lifecycle of a [`BrowserSessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No process; the next `ensure_ready` launches one.
    Uninitialized,
    /// A launch is in progress.
    Initializing,
    /// The process is up and tabs can be opened.
    Ready,
    /// Shut down; the next `ensure_ready` launches a new process.
    Closed,
}

type InitSignal = Option<std::result::Result<(), Arc<SearchError>>>;

struct Shared {
    state: SessionState,
    handle: Option<Arc<dyn BrowserHandle>>,
    root: CancellationToken,
    pending: Option<watch::Receiver<InitSignal>>,
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rebuilds an initialization failure for each waiting caller.
fn replicate(err: &SearchError) -> SearchError {
    match err {
        SearchError::ResourceUnavailable(msg) => SearchError::ResourceUnavailable(msg.clone()),
        SearchError::Browser(msg) => SearchError::Browser(msg.clone()),
        SearchError::Timeout => SearchError::Timeout,
        SearchError::Cancelled => SearchError::Cancelled,
        other => SearchError::Browser(other.to_string()),
    }
}

async fn launch_and_warm_up(
    backend: &dyn BrowserBackend,
    options: &LaunchOptions,
) -> Result<Arc<dyn BrowserHandle>> {
    let handle = backend.launch(options).await?;
    if let Err(e) = handle.warm_up().await {
        if let Err(close_err) = handle.close().await {
            warn!("Failed to close browser after warm-up failure: {}", close_err);
        }
        return Err(e);
    }
    Ok(handle)
}

/// Process-wide browser session shared by browser-driven engines.
///
/// The transition lock serializes only launch and shutdown; once `Ready`,
/// any number of tabs may be open concurrently.
pub struct BrowserSessionManager {
    backend: Arc<dyn BrowserBackend>,
    shared: Arc<Mutex<Shared>>,
    transition: Arc<tokio::sync::Mutex<()>>,
    retry_backoff: Duration,
}

impl BrowserSessionManager {
    /// Creates an uninitialized session over `backend`.
    pub fn new(backend: Arc<dyn BrowserBackend>) -> Self {
        Self {
            backend,
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Uninitialized,
                handle: None,
                root: CancellationToken::new(),
                pending: None,
                generation: 0,
            })),
            transition: Arc::new(tokio::sync::Mutex::new(())),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the base of the linear retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        lock(&self.shared).state
    }

    /// Makes sure the browser is running, launching it if needed.
    ///
    /// Concurrent callers during a launch wait for that same launch and all
    /// observe its outcome. A failed launch returns the session to
    /// `Uninitialized` so a later call may try again.
    pub async fn ensure_ready(&self, options: &LaunchOptions) -> Result<()> {
        let mut pending = {
            let mut shared = lock(&self.shared);
            match shared.state {
                SessionState::Ready => return Ok(()),
                SessionState::Initializing => match &shared.pending {
                    Some(rx) => rx.clone(),
                    None => {
                        return Err(SearchError::Browser(
                            "browser initialization state lost".to_string(),
                        ))
                    }
                },
                SessionState::Uninitialized | SessionState::Closed => {
                    let (tx, rx) = watch::channel(None);
                    shared.state = SessionState::Initializing;
                    shared.pending = Some(rx.clone());
                    shared.generation += 1;
                    self.spawn_initialization(options.clone(), shared.generation, tx);
                    rx
                }
            }
        };

        let outcome = pending
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SearchError::Browser("browser initialization aborted".to_string()))?
            .clone();

        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(replicate(&e)),
            None => Err(SearchError::Browser(
                "browser initialization aborted".to_string(),
            )),
        }
    }

    /// Runs the launch on its own task so an abandoned caller cannot leave
    /// the session stuck in `Initializing`.
    ///
    /// A launch whose `generation` was superseded by a shutdown before it
    /// acquired the transition lock does not start a process.
    fn spawn_initialization(
        &self,
        options: LaunchOptions,
        generation: u64,
        tx: watch::Sender<InitSignal>,
    ) {
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let transition = Arc::clone(&self.transition);

        tokio::spawn(async move {
            let _guard = transition.lock().await;
            let current = {
                let shared = lock(&shared);
                shared.generation == generation && shared.state == SessionState::Initializing
            };
            if !current {
                debug!("Browser launch abandoned, session shut down first");
                tx.send_replace(Some(Err(Arc::new(SearchError::Cancelled))));
                return;
            }

            info!("Launching browser (headless={})", options.headless);
            let outcome = launch_and_warm_up(backend.as_ref(), &options).await;

            let signal = {
                let mut shared = lock(&shared);
                shared.pending = None;
                match outcome {
                    Ok(handle) => {
                        shared.state = SessionState::Ready;
                        shared.handle = Some(handle);
                        shared.root = CancellationToken::new();
                        info!("Browser session ready");
                        Ok(())
                    }
                    Err(e) => {
                        shared.state = SessionState::Uninitialized;
                        warn!("Browser initialization failed: {}", e);
                        Err(Arc::new(e))
                    }
                }
            };
            tx.send_replace(Some(signal));
        });
    }

    /// Opens a tab that lives at most `timeout`.
    ///
    /// The lease is cancelled when the session shuts down.
    pub async fn new_page(&self, timeout: Duration) -> Result<TabLease> {
        let (handle, root) = {
            let shared = lock(&self.shared);
            match (&shared.state, &shared.handle) {
                (SessionState::Ready, Some(handle)) => (Arc::clone(handle), shared.root.clone()),
                (state, _) => {
                    return Err(SearchError::Browser(format!(
                        "browser session is not ready ({:?})",
                        state
                    )))
                }
            }
        };

        let tab = handle.open_tab().await?;
        debug!("Opened browser tab (timeout {:?})", timeout);
        Ok(TabLease {
            tab: Some(tab),
            cancel: root.child_token(),
            deadline: Instant::now() + timeout,
        })
    }

    /// Runs `action` up to `max_attempts` times, sleeping `backoff * n`
    /// after the n-th failure. Returns the last error when every attempt
    /// fails. Missing resources are not retried.
    pub async fn run_with_retries<T, F, Fut>(&self, max_attempts: u32, mut action: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = max_attempts.max(1);
        let root = lock(&self.shared).root.clone();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match action(attempt).await {
                Ok(value) => return Ok(value),
                Err(e @ (SearchError::Cancelled | SearchError::ResourceUnavailable(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    warn!("Browser attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                let backoff = self.retry_backoff * attempt;
                tokio::select! {
                    biased;
                    _ = root.cancelled() => return Err(SearchError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SearchError::Browser("browser action never ran".to_string())))
    }

    /// Cancels every open lease, closes the process and marks the session
    /// `Closed`. A later `ensure_ready` launches a new process.
    pub async fn shutdown(&self) {
        let _guard = self.transition.lock().await;
        let handle = {
            let mut shared = lock(&self.shared);
            shared.root.cancel();
            shared.state = SessionState::Closed;
            shared.pending = None;
            shared.generation += 1;
            shared.handle.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.close().await {
                warn!("Failed to close browser: {}", e);
            }
            info!("Browser session shut down");
        }
    }
}

/// Exclusive, time-bounded use of one tab.
///
/// Call [`TabLease::release`] when done. A lease dropped on an error or
/// cancellation path closes its tab on a background task.
pub struct TabLease {
    tab: Option<Box<dyn BrowserTab>>,
    cancel: CancellationToken,
    deadline: Instant,
}

impl TabLease {
    /// The leased tab.
    pub fn tab(&self) -> Result<&dyn BrowserTab> {
        self.tab
            .as_deref()
            .ok_or_else(|| SearchError::Browser("tab already released".to_string()))
    }

    /// Time left before the lease expires.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` bounded by the lease deadline and session shutdown.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SearchError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(SearchError::Timeout),
            out = fut => out,
        }
    }

    /// Closes the tab and releases the lease.
    pub async fn release(mut self) {
        self.cancel.cancel();
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close().await {
                warn!("Failed to close browser tab: {}", e);
            }
        }
    }
}

impl Drop for TabLease {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(tab) = self.tab.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(e) = tab.close().await {
                        debug!("Failed to close abandoned browser tab: {}", e);
                    }
                });
            }
        }
    }
}

/// A [`PageFetcher`] that renders pages in the shared browser session.
///
/// Each fetch leases a fresh tab, navigates, waits according to the
/// request's [`WaitStrategy`], lets the page settle, scrolls half a page,
/// captures the markup and releases the tab. Failed attempts are retried.
pub struct BrowserFetcher {
    session: Arc<BrowserSessionManager>,
    options: LaunchOptions,
    tab_timeout: Duration,
    max_attempts: u32,
    settle: Duration,
    scroll_pause: Duration,
}

impl BrowserFetcher {
    /// Creates a fetcher that launches the session with `options` on first use.
    pub fn new(session: Arc<BrowserSessionManager>, options: LaunchOptions) -> Self {
        Self {
            session,
            options,
            tab_timeout: Duration::from_secs(60),
            max_attempts: 2,
            settle: Duration::from_secs(2),
            scroll_pause: Duration::from_millis(500),
        }
    }

    /// Sets the lifetime of each tab.
    pub fn with_tab_timeout(mut self, timeout: Duration) -> Self {
        self.tab_timeout = timeout;
        self
    }

    /// Sets the number of attempts per fetch.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the settle time after load and the pause after scrolling.
    pub fn with_settle(mut self, settle: Duration, scroll_pause: Duration) -> Self {
        self.settle = settle;
        self.scroll_pause = scroll_pause;
        self
    }

    async fn render(&self, tab: &dyn BrowserTab, request: &PageRequest) -> Result<FetchedPage> {
        tab.navigate(&request.url).await?;

        match &request.wait {
            WaitStrategy::Load => {}
            WaitStrategy::Selector { css, timeout_ms } => {
                let timeout = Duration::from_millis(*timeout_ms);
                if !tab.wait_for(css, timeout).await? {
                    debug!(
                        "Selector '{}' not found within {}ms, proceeding with current page content",
                        css, timeout_ms
                    );
                }
            }
            WaitStrategy::Delay { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }

        tokio::time::sleep(self.settle).await;
        tab.evaluate(SCROLL_SCRIPT).await?;
        tokio::time::sleep(self.scroll_pause).await;

        let final_url = tab.current_url().await?;
        let body = tab.content().await?;
        Ok(FetchedPage {
            status: 200,
            final_url,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage> {
        self.session.ensure_ready(&self.options).await?;

        let page = self
            .session
            .run_with_retries(self.max_attempts, |attempt| async move {
                debug!("Navigating to {} (attempt {})", request.url, attempt);
                let lease = self.session.new_page(self.tab_timeout).await?;
                let out = lease
                    .run(async { self.render(lease.tab()?, request).await })
                    .await;
                lease.release().await;
                out
            })
            .await?;

        debug!("Got page HTML, size: {} bytes", page.body.len());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        tabs_opened: AtomicUsize,
        tabs_closed: AtomicUsize,
        browsers_closed: AtomicUsize,
        navigation_failures: AtomicUsize,
    }

    struct FakeBackend {
        counters: Arc<Counters>,
        fail_launch: bool,
        launch_delay: Duration,
        html: &'static str,
    }

    impl FakeBackend {
        fn new(html: &'static str) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                fail_launch: false,
                launch_delay: Duration::from_millis(50),
                html,
            }
        }
    }

    #[async_trait]
    impl BrowserBackend for FakeBackend {
        async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.launch_delay).await;
            if self.fail_launch {
                return Err(SearchError::ResourceUnavailable(
                    "Chrome/Chromium not found. Please install Chrome browser".to_string(),
                ));
            }
            Ok(Arc::new(FakeHandle {
                counters: Arc::clone(&self.counters),
                html: self.html,
            }))
        }
    }

    struct FakeHandle {
        counters: Arc<Counters>,
        html: &'static str,
    }

    #[async_trait]
    impl BrowserHandle for FakeHandle {
        async fn warm_up(&self) -> Result<()> {
            Ok(())
        }

        async fn open_tab(&self) -> Result<Box<dyn BrowserTab>> {
            self.counters.tabs_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeTab {
                counters: Arc::clone(&self.counters),
                html: self.html,
                url: Mutex::new(String::new()),
            }))
        }

        async fn close(&self) -> Result<()> {
            self.counters.browsers_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeTab {
        counters: Arc<Counters>,
        html: &'static str,
        url: Mutex<String>,
    }

    #[async_trait]
    impl BrowserTab for FakeTab {
        async fn navigate(&self, url: &str) -> Result<()> {
            let remaining = self.counters.navigation_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.counters
                    .navigation_failures
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(SearchError::Browser("net::ERR_CONNECTION_RESET".to_string()));
            }
            *self.url.lock().unwrap() = url.to_string();
            Ok(())
        }

        async fn wait_for(&self, css: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.html.contains(css.trim_start_matches('#')))
        }

        async fn evaluate(&self, _script: &str) -> Result<()> {
            Ok(())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(self.url.lock().unwrap().clone())
        }

        async fn content(&self) -> Result<String> {
            Ok(self.html.to_string())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.counters.tabs_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager(backend: FakeBackend) -> (Arc<BrowserSessionManager>, Arc<Counters>) {
        let counters = Arc::clone(&backend.counters);
        (
            Arc::new(BrowserSessionManager::new(Arc::new(backend))),
            counters,
        )
    }

    #[test]
    fn test_launch_options_args() {
        let options = LaunchOptions {
            proxy: Some(ProxyConfig::parse("http://127.0.0.1:7890").unwrap()),
            extra_args: vec!["--disable-web-security".to_string()],
            ..Default::default()
        };
        let args = options.args();
        assert_eq!(args[0], "--window-size=1920,1080");
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--lang=en-US".to_string()));
        assert!(args.contains(&"--proxy-server=http://127.0.0.1:7890".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--disable-web-security"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
    }

    #[test]
    fn test_launch_options_headless_flag_left_to_backend() {
        let headed = LaunchOptions {
            headless: false,
            ..Default::default()
        };
        assert_eq!(headed.args(), LaunchOptions::default().args());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_ready_launches_once() {
        let (session, counters) = manager(FakeBackend::new("<html></html>"));
        let options = LaunchOptions::default();

        let calls = (0..10).map(|_| session.ensure_ready(&options));
        let outcomes = futures::future::join_all(calls).await;

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Ready);

        session.ensure_ready(&options).await.unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_ready_shares_failure() {
        let backend = FakeBackend {
            fail_launch: true,
            ..FakeBackend::new("")
        };
        let (session, counters) = manager(backend);
        let options = LaunchOptions::default();

        let calls = (0..10).map(|_| session.ensure_ready(&options));
        let outcomes = futures::future::join_all(calls).await;

        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            match outcome {
                Err(SearchError::ResourceUnavailable(msg)) => {
                    assert!(msg.contains("Chrome/Chromium not found"))
                }
                other => panic!("unexpected outcome: {:?}", other.err()),
            }
        }
        assert_eq!(session.state(), SessionState::Uninitialized);

        assert!(session.ensure_ready(&options).await.is_err());
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_new_page_requires_ready() {
        let (session, _) = manager(FakeBackend::new(""));
        let err = session.new_page(Duration::from_secs(5)).await.err().unwrap();
        assert!(matches!(err, SearchError::Browser(_)));
    }

    #[tokio::test]
    async fn test_lease_release_closes_tab() {
        let (session, counters) = manager(FakeBackend::new("<html></html>"));
        session.ensure_ready(&LaunchOptions::default()).await.unwrap();

        let first = session.new_page(Duration::from_secs(5)).await.unwrap();
        let second = session.new_page(Duration::from_secs(5)).await.unwrap();
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 2);

        first.release().await;
        assert_eq!(counters.tabs_closed.load(Ordering::SeqCst), 1);

        drop(second);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counters.tabs_closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_deadline() {
        let (session, _) = manager(FakeBackend::new(""));
        session.ensure_ready(&LaunchOptions::default()).await.unwrap();
        let lease = session.new_page(Duration::from_secs(3)).await.unwrap();

        let out: Result<()> = lease
            .run(async {
                futures::future::pending::<()>().await;
                Ok(())
            })
            .await;
        assert!(matches!(out, Err(SearchError::Timeout)));
        assert_eq!(lease.remaining(), Duration::ZERO);
        lease.release().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_open_leases() {
        let (session, counters) = manager(FakeBackend::new(""));
        session.ensure_ready(&LaunchOptions::default()).await.unwrap();
        let lease = session.new_page(Duration::from_secs(60)).await.unwrap();

        let waiting = lease.run(async {
            futures::future::pending::<()>().await;
            Ok(())
        });
        let (out, ()) = tokio::join!(waiting, session.shutdown());

        assert!(matches!(out, Err(SearchError::Cancelled)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(counters.browsers_closed.load(Ordering::SeqCst), 1);
        lease.release().await;
    }

    #[tokio::test]
    async fn test_shutdown_while_launch_pending() {
        let (session, counters) = manager(FakeBackend::new(""));
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ensure_ready(&LaunchOptions::default()).await })
        };
        while session.state() != SessionState::Initializing {
            tokio::task::yield_now().await;
        }

        session.shutdown().await;
        let outcome = waiter.await.unwrap();

        assert!(matches!(outcome, Ok(()) | Err(SearchError::Cancelled)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            counters.browsers_closed.load(Ordering::SeqCst),
            counters.launches.load(Ordering::SeqCst)
        );
        assert!(session.new_page(Duration::from_secs(1)).await.is_err());

        session.ensure_ready(&LaunchOptions::default()).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_reinitialize_after_shutdown() {
        let (session, counters) = manager(FakeBackend::new(""));
        let options = LaunchOptions::default();
        session.ensure_ready(&options).await.unwrap();
        session.shutdown().await;
        session.shutdown().await;
        assert_eq!(session.state(), SessionState::Closed);

        session.ensure_ready(&options).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
        assert!(session.new_page(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_retries_linear_backoff() {
        let (session, _) = manager(FakeBackend::new(""));
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let value = session
            .run_with_retries(3, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(SearchError::Browser(format!("attempt {} failed", attempt)))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_retries_returns_last_error() {
        let (session, _) = manager(FakeBackend::new(""));
        let start = Instant::now();

        let err = session
            .run_with_retries(3, |attempt| async move {
                Err::<(), _>(SearchError::Browser(format!("attempt {} failed", attempt)))
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Browser error: attempt 3 failed");
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_retries_does_not_retry_missing_browser() {
        let (session, _) = manager(FakeBackend::new(""));
        let calls = AtomicUsize::new(0);
        let err = session
            .run_with_retries(3, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SearchError::ResourceUnavailable("no chrome".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::ResourceUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_fetcher_renders_and_releases() {
        let backend = FakeBackend::new("<div id=\"b_results\">rendered</div>");
        let (session, counters) = manager(backend);
        let fetcher = BrowserFetcher::new(Arc::clone(&session), LaunchOptions::default());

        let request = PageRequest::new("https://www.bing.com/search?q=rust").with_wait(
            WaitStrategy::Selector {
                css: "#b_results".to_string(),
                timeout_ms: 5000,
            },
        );
        let page = fetcher.fetch(&request).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.final_url, "https://www.bing.com/search?q=rust");
        assert!(page.body.contains("rendered"));
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.tabs_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_fetcher_retries_navigation() {
        let backend = FakeBackend::new("<html>ok</html>");
        backend.counters.navigation_failures.store(1, Ordering::SeqCst);
        let (session, counters) = manager(backend);
        let fetcher = BrowserFetcher::new(Arc::clone(&session), LaunchOptions::default())
            .with_max_attempts(2);

        let page = fetcher
            .fetch(&PageRequest::new("https://www.google.com/search?q=rust"))
            .await
            .unwrap();

        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 2);
        assert_eq!(counters.tabs_closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_fetcher_gives_up_after_attempts() {
        let backend = FakeBackend::new("<html>ok</html>");
        backend.counters.navigation_failures.store(5, Ordering::SeqCst);
        let (session, _) = manager(backend);
        let fetcher = BrowserFetcher::new(Arc::clone(&session), LaunchOptions::default())
            .with_max_attempts(2);

        let err = fetcher
            .fetch(&PageRequest::new("https://www.baidu.com/s?wd=rust"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Browser(_)));
    }
}
