//! Error types for the search library.

use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed (connection, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a status that is neither success nor a challenge.
    #[error("unexpected status code: {status}")]
    Status {
        /// HTTP status returned by the engine.
        status: u16,
    },

    /// An anti-bot challenge was served and no results could be produced.
    #[error("{0} rate limited: captcha or verification page served")]
    Blocked(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A required local resource (browser executable or process) is missing.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The engine is unknown or not permitted by the allow-list.
    #[error("Engine '{0}' rejected by configuration")]
    ConfigRejected(String),

    /// Browser navigation or tab operation failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Search timeout exceeded.
    #[error("Search timeout exceeded")]
    Timeout,

    /// The caller cancelled the search.
    #[error("Search cancelled")]
    Cancelled,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Every queried engine failed; carries the most recent failure.
    #[error("all searches failed, last error: {0}")]
    AllEnginesFailed(#[source] Box<SearchError>),
}

impl SearchError {
    /// Returns `true` for failures caused by the caller giving up.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}
