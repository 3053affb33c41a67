//! Chrome/Chromium executable discovery.
//!
//! Looks for an installed browser in this order: an explicitly configured
//! path, the `CHROME` environment variable, well-known command names in
//! `PATH`, and finally well-known install locations for the platform.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{Result, SearchError};

/// Message returned when no executable can be found.
pub const NOT_FOUND_MESSAGE: &str = "Chrome/Chromium not found. Please install Chrome browser";

/// Well-known Chrome/Chromium executable paths per platform.
#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/opt/chromium.org/chromium/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(windows)]
const KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(unix, windows)))]
const KNOWN_PATHS: &[&str] = &[];

/// Well-known command names to search in PATH.
const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Detect a Chrome/Chromium installation.
///
/// An `explicit` path that does not exist is skipped, not treated as fatal.
pub fn detect_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            debug!("Chrome found at configured path: {}", path.display());
            return Some(path.to_path_buf());
        }
        debug!("Configured Chrome path does not exist: {}", path.display());
    }

    if let Ok(path) = std::env::var("CHROME") {
        let p = PathBuf::from(&path);
        if p.exists() {
            debug!("Chrome found via CHROME env var: {}", path);
            return Some(p);
        }
    }

    for cmd in KNOWN_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("Chrome found in PATH: {}", path.display());
            return Some(path);
        }
    }

    KNOWN_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(|p| {
            debug!("Chrome found at known path: {}", p.display());
            p.to_path_buf()
        })
}

/// Like [`detect_chrome`] but fails with
/// [`SearchError::ResourceUnavailable`] when nothing is installed.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = detect_chrome(explicit)
        .ok_or_else(|| SearchError::ResourceUnavailable(NOT_FOUND_MESSAGE.to_string()))?;
    info!("Using Chrome: {}", path.display());
    Ok(path)
}
