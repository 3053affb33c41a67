//! Chrome DevTools backend for the browser session, built on chromiumoxide.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::browser::{BrowserBackend, BrowserHandle, BrowserTab, LaunchOptions};
use crate::browser_setup::find_chrome;
use crate::{Result, SearchError};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

fn cdp_error(context: &str, e: impl std::fmt::Display) -> SearchError {
    SearchError::Browser(format!("{}: {}", context, e))
}

/// Launches a local Chrome/Chromium process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumBackend;

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>> {
        let executable = find_chrome(options.executable.as_deref())?;

        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        if !options.headless {
            builder = builder.with_head();
        }
        for arg in options.args() {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| SearchError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SearchError::ResourceUnavailable(format!("Failed to launch browser: {}", e)))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        Ok(Arc::new(ChromiumHandle {
            browser: Mutex::new(browser),
            events,
        }))
    }
}

struct ChromiumHandle {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
}

#[async_trait]
impl BrowserHandle for ChromiumHandle {
    async fn warm_up(&self) -> Result<()> {
        let version = self
            .browser
            .lock()
            .await
            .version()
            .await
            .map_err(|e| cdp_error("Browser warm-up failed", e))?;
        debug!("Connected to {}", version.product);
        Ok(())
    }

    async fn open_tab(&self) -> Result<Box<dyn BrowserTab>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| cdp_error("Failed to open tab", e))?;
        Ok(Box::new(ChromiumTab { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map_err(|e| cdp_error("Failed to close browser", e));
        if closed.is_ok() {
            if let Err(e) = browser.wait().await {
                debug!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.events.abort();
        closed.map(|_| ())
    }
}

struct ChromiumTab {
    page: Page,
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| cdp_error("Navigation failed", e))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| cdp_error("Navigation wait failed", e))?;
        Ok(())
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool> {
        let found = tokio::time::timeout(timeout, async {
            loop {
                if self.page.find_element(css).await.is_ok() {
                    break;
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        })
        .await;
        Ok(found.is_ok())
    }

    async fn evaluate(&self, script: &str) -> Result<()> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| cdp_error("Script evaluation failed", e))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| cdp_error("Failed to read page URL", e))?
            .unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| cdp_error("Failed to get page content", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| cdp_error("Failed to close tab", e))
    }
}
