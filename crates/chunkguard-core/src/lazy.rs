//! Lazily loaded components with built-in recovery.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::RetryOptions;
use crate::engine::RetryEngine;
use crate::loader::{Loader, ModuleHandle};

/// A deferred component whose first resolution runs the retry chain.
///
/// Resolution is memoized: however many times the component re-renders,
/// the chain runs once and every caller sees the same handle.
pub struct LazyComponent {
    engine: Arc<RetryEngine>,
    loader: Loader,
    options: RetryOptions,
    resolved: OnceCell<ModuleHandle>,
}

impl LazyComponent {
    pub fn new(engine: Arc<RetryEngine>, loader: Loader, options: RetryOptions) -> Self {
        Self {
            engine,
            loader,
            options,
            resolved: OnceCell::new(),
        }
    }

    /// Resolve the component, loading it on first use.
    ///
    /// Never fails for a load failure: the handle is the loaded module or
    /// the configured fallback. Does not return at all when the chain
    /// escalates to a page reload.
    pub async fn resolve(&self) -> &ModuleHandle {
        self.resolved
            .get_or_init(|| {
                self.engine
                    .attempt_load(Arc::clone(&self.loader), &self.options)
            })
            .await
    }

    /// The already resolved handle, if any.
    pub fn get(&self) -> Option<&ModuleHandle> {
        self.resolved.get()
    }
}

/// Wrap a deferred module loader with retry, refresh and fallback recovery.
///
/// The returned component resolves to the loaded module, or to the
/// configured fallback view once every budget is spent; a load failure is
/// never surfaced as an error.
pub fn wrap_with_retry(
    engine: Arc<RetryEngine>,
    loader: Loader,
    options: RetryOptions,
) -> LazyComponent {
    LazyComponent::new(engine, loader, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{loader_from_fn, Component, LoadError, ModuleImporter};
    use crate::reload::Refresher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Loaded;

    impl Component for Loaded {
        fn render(&self) -> String {
            "loaded".to_string()
        }
    }

    struct NoopRefresher;

    #[async_trait]
    impl Refresher for NoopRefresher {
        async fn bust_cache_and_reload(&self) {}
    }

    struct NoopImporter;

    #[async_trait]
    impl ModuleImporter for NoopImporter {
        async fn import(&self, url: &str) -> Result<ModuleHandle, LoadError> {
            Err(LoadError::ModuleFetch(url.to_string()))
        }
    }

    fn engine() -> Arc<RetryEngine> {
        Arc::new(
            RetryEngine::builder()
                .refresher(Arc::new(NoopRefresher))
                .importer(Arc::new(NoopImporter))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_transient_failures_and_memoizes() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let loader = loader_from_fn(move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LoadError::Other("Failed".to_string()))
                } else {
                    Ok(ModuleHandle::new(Arc::new(Loaded)))
                }
            }
        });

        let component = wrap_with_retry(
            engine(),
            loader,
            RetryOptions::new()
                .retries(2)
                .interval(Duration::from_millis(1)),
        );

        assert!(component.get().is_none());
        assert_eq!(component.resolve().await.render(), "loaded");

        // Two failures plus the success; a second resolve re-runs nothing.
        assert_eq!(component.resolve().await.render(), "loaded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(component.get().is_some());
    }
}
