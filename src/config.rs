//! Configuration surface read by the coordinator and engines.
//!
//! Loading these settings (files, environment) is the host process's job;
//! this module only defines the shape, defaults and normalization.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Every engine identifier this crate can register.
pub const KNOWN_ENGINES: &[&str] = &[
    "bing",
    "duckduckgo",
    "baidu",
    "sogou",
    "browser_bing",
    "browser_google",
    "browser_baidu",
];

/// Engine used when a request names none and the settings hold no valid default.
pub const FALLBACK_ENGINE: &str = "duckduckgo";

/// Proxy used when the proxy is enabled without a URL.
pub const FALLBACK_PROXY_URL: &str = "http://127.0.0.1:7890";

/// Upstream proxy settings, applied to HTTP and browser traffic alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Whether the proxy is used.
    #[serde(default)]
    pub enabled: bool,
    /// Proxy URL (http, https or socks5).
    #[serde(default = "default_proxy_url")]
    pub url: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_proxy_url(),
        }
    }
}

/// Settings for browser-driven engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Whether browser engines are registered at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Run the browser without a window.
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Explicit browser executable. Auto-detected when absent.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Lifetime of a single tab, in seconds.
    #[serde(default = "default_tab_timeout")]
    pub tab_timeout_secs: u64,
    /// Attempts per page fetch before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            executable: None,
            tab_timeout_secs: default_tab_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BrowserSettings {
    /// Tab lifetime as a [`Duration`].
    pub fn tab_timeout(&self) -> Duration {
        Duration::from_secs(self.tab_timeout_secs)
    }
}

/// Top-level search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Engine used when a request names none.
    #[serde(default = "default_engine")]
    pub default_engine: String,
    /// Engines requests may use. Empty permits every registered engine.
    #[serde(default)]
    pub allowed_engines: Vec<String>,
    /// Upstream proxy.
    #[serde(default)]
    pub proxy: ProxySettings,
    /// Browser engines.
    #[serde(default)]
    pub browser: BrowserSettings,
    /// Wall-clock bound for one engine's whole search, in seconds.
    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_secs: u64,
}

fn default_engine() -> String {
    FALLBACK_ENGINE.to_string()
}

fn default_proxy_url() -> String {
    FALLBACK_PROXY_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_tab_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    2
}

fn default_engine_timeout() -> u64 {
    90
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_engine: default_engine(),
            allowed_engines: Vec::new(),
            proxy: ProxySettings::default(),
            browser: BrowserSettings::default(),
            engine_timeout_secs: default_engine_timeout(),
        }
    }
}

impl SearchSettings {
    /// Normalizes user-supplied values, logging every correction.
    pub fn validate(mut self) -> Self {
        if !is_known_engine(&self.default_engine) {
            warn!(
                "Invalid default_engine: {}, falling back to {}",
                self.default_engine, FALLBACK_ENGINE
            );
            self.default_engine = FALLBACK_ENGINE.to_string();
        }

        let mut allowed = Vec::with_capacity(self.allowed_engines.len());
        for name in &self.allowed_engines {
            let name = name.trim();
            if !is_known_engine(name) {
                warn!("Invalid search engine ignored: {}", name);
            } else if !allowed.iter().any(|a: &String| a == name) {
                allowed.push(name.to_string());
            }
        }
        self.allowed_engines = allowed;

        if let Some(first) = self.allowed_engines.first() {
            if !self.allowed_engines.contains(&self.default_engine) {
                warn!(
                    "Default engine {} not in allowed list, using {}",
                    self.default_engine, first
                );
                self.default_engine = first.clone();
            }
        }

        if self.proxy.enabled && self.proxy.url.trim().is_empty() {
            warn!("Proxy enabled but URL is empty, using {}", FALLBACK_PROXY_URL);
            self.proxy.url = FALLBACK_PROXY_URL.to_string();
        }

        if self.browser.max_attempts == 0 {
            self.browser.max_attempts = 1;
        }

        self
    }

    /// Whether requests may use `engine`. An empty allow-list permits all.
    pub fn is_engine_allowed(&self, engine: &str) -> bool {
        self.allowed_engines.is_empty() || self.allowed_engines.iter().any(|a| a == engine)
    }

    /// The proxy URL, when the proxy is enabled.
    pub fn proxy_url(&self) -> Option<&str> {
        if self.proxy.enabled && !self.proxy.url.trim().is_empty() {
            Some(self.proxy.url.trim())
        } else {
            None
        }
    }

    /// Per-engine wall-clock bound.
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs.max(1))
    }

    /// Logs the effective settings at info level.
    pub fn log_summary(&self) {
        info!("Default search engine: {}", self.default_engine);
        if self.allowed_engines.is_empty() {
            info!("No search engine restrictions, all registered engines can be used");
        } else {
            info!("Allowed search engines: {}", self.allowed_engines.join(", "));
        }
        match self.proxy_url() {
            Some(url) => info!("Using proxy: {}", url),
            None => info!("No proxy configured"),
        }
        info!(
            "Browser engines enabled: {} (headless={})",
            self.browser.enabled, self.browser.headless
        );
    }
}

/// Whether `engine` is one of [`KNOWN_ENGINES`].
pub fn is_known_engine(engine: &str) -> bool {
    KNOWN_ENGINES.contains(&engine)
}
