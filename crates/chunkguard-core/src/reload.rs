//! Best-effort cache clearing followed by an unconditional page reload.
//!
//! This is the escalation primitive the retry engine invokes once in-page
//! retries are spent and refresh budget remains. Cache cleanup can fail for
//! any number of platform reasons; none of them may stop the reload.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`CacheStorage`] backend.
#[derive(Error, Debug)]
pub enum CacheStorageError {
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),

    #[error("cache storage backend error: {0}")]
    Backend(String),
}

/// Browser-style named response caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every cache the platform currently holds.
    async fn cache_names(&self) -> Result<Vec<String>, CacheStorageError>;

    /// Delete one cache by name. `Ok(false)` when it did not exist.
    async fn delete_cache(&self, name: &str) -> Result<bool, CacheStorageError>;
}

/// Full page reload. Fire-and-forget process replacement; there is nothing
/// to await and nothing to report back.
pub trait PageReloader: Send + Sync {
    fn reload(&self);
}

/// The engine's view of the reload escalation.
#[async_trait]
pub trait Refresher: Send + Sync {
    /// Clear what caches can be cleared, then reload the page.
    async fn bust_cache_and_reload(&self);
}

/// Ignore-and-continue for best-effort cache cleanup. Keeps the suppression
/// visible instead of hiding it in an empty catch.
fn best_effort<T>(result: Result<T, CacheStorageError>, action: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::debug!(%error, action, "ignoring cache storage failure");
            None
        }
    }
}

/// Default [`Refresher`]: enumerate and delete response caches on a
/// best-effort basis, then reload unconditionally.
pub struct CacheBustRefresher {
    caches: Option<Arc<dyn CacheStorage>>,
    page: Arc<dyn PageReloader>,
}

impl CacheBustRefresher {
    /// Hosts without a cache storage capability pass `None`; the reload
    /// still happens.
    pub fn new(caches: Option<Arc<dyn CacheStorage>>, page: Arc<dyn PageReloader>) -> Self {
        Self { caches, page }
    }
}

#[async_trait]
impl Refresher for CacheBustRefresher {
    async fn bust_cache_and_reload(&self) {
        if let Some(caches) = &self.caches {
            if let Some(names) = best_effort(caches.cache_names().await, "enumerate caches") {
                for name in names {
                    best_effort(caches.delete_cache(&name).await, "delete cache");
                }
            }
        }
        self.page.reload();
    }
}
