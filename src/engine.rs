//! Search engine trait and descriptors.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Result, SearchError, SearchResult};

/// How an engine reaches its result pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineCapability {
    /// Plain HTTP requests and server-rendered markup.
    #[default]
    HttpOnly,
    /// Pages rendered in the shared automation browser.
    BrowserDriven,
}

/// Registry entry describing a registered engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Stable identifier, used as registry key and stamped on results.
    pub identifier: String,
    /// Transport the engine depends on.
    pub capability: EngineCapability,
}

/// Trait for implementing search engines.
///
/// `search` is best-effort: it may return fewer than `limit` results, and
/// returns an error only when nothing at all could be produced. In-flight
/// network or browser work must stop once `cancel` fires.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the engine identifier.
    fn identifier(&self) -> &str;

    /// Returns the transport this engine depends on.
    fn capability(&self) -> EngineCapability;

    /// Performs a search and returns at most `limit` results.
    async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Returns the registry descriptor for this engine.
    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            identifier: self.identifier().to_string(),
            capability: self.capability(),
        }
    }
}

/// Runs `fut` unless `cancel` fires first, in which case it is dropped.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SearchError::Cancelled),
        out = fut => out,
    }
}
