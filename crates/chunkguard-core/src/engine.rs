//! The retry/refresh decision engine.
//!
//! Given a loader for a deferred module, the engine drives the whole
//! recovery ladder:
//!
//! 1. in-page retries, against a cache-busted module URL when the failure
//!    names one, against the unmodified loader otherwise;
//! 2. escalation to a full page reload, anti-looped through a counter that
//!    survives the reload in the session store;
//! 3. terminal resolution to the configured fallback view.
//!
//! A load failure never reaches the caller as an error: the returned future
//! yields a module handle (real or fallback), or never completes because
//! the page is being replaced.

use std::future;
use std::sync::Arc;

use thiserror::Error;

use crate::budget::RefreshLedger;
use crate::cachebust::{cache_busted_url, Clock, SystemClock};
use crate::config::RetryOptions;
use crate::loader::{loader_from_url, LoadError, Loader, ModuleHandle, ModuleImporter};
use crate::reload::Refresher;
use crate::store::{MemoryStore, SessionStore};

/// Engine construction errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("collaborator not configured: {0}")]
    NotConfigured(&'static str),
}

/// Drives retry, refresh and fallback for deferred module loads.
///
/// One engine serves any number of wrapped components. Each
/// [`attempt_load`](RetryEngine::attempt_load) call owns an independent
/// retry/refresh budget pair; the only state shared between chains is the
/// session store behind the persisted refresh counter.
pub struct RetryEngine {
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn Refresher>,
    importer: Arc<dyn ModuleImporter>,
    clock: Arc<dyn Clock>,
}

impl RetryEngine {
    /// Start building an engine.
    pub fn builder() -> RetryEngineBuilder {
        RetryEngineBuilder::new()
    }

    /// Attempt a deferred module load under `options`.
    ///
    /// Resolves with the loaded module on success, with the fallback view
    /// once every budget is exhausted, and does not resolve at all when the
    /// chain escalates to a page reload.
    pub async fn attempt_load(&self, loader: Loader, options: &RetryOptions) -> ModuleHandle {
        let mut loader = loader;
        let mut retries_left = options.policy.retries;

        loop {
            let error = match loader().await {
                Ok(handle) => return handle,
                Err(error) => error,
            };

            tracing::debug!(%error, retries_left, "deferred module load failed");
            tokio::time::sleep(options.policy.interval).await;

            if retries_left == 0 {
                return self.escalate_or_fall_back(&error, options).await;
            }

            if let Some(url) = cache_busted_url(&error, self.clock.now_millis()) {
                tracing::debug!(%url, "next attempt goes to cache-busted module URL");
                loader = loader_from_url(Arc::clone(&self.importer), url);
            }

            retries_left -= 1;
            options.hooks.notify_retry(&error, retries_left);
        }
    }

    /// Retries are spent: burn one refresh from the persisted budget, or
    /// resolve the fallback view.
    async fn escalate_or_fall_back(
        &self,
        error: &LoadError,
        options: &RetryOptions,
    ) -> ModuleHandle {
        let refresh = options
            .policy
            .force_refresh
            .as_ref()
            .filter(|refresh| refresh.refresh_retries > 0);

        if let Some(refresh) = refresh {
            let ledger = RefreshLedger::new(self.store.as_ref(), refresh);
            let remaining = ledger.remaining();
            if remaining > 0 {
                let left = remaining - 1;
                ledger.record_refresh(left);
                tracing::warn!(
                    %error,
                    refreshes_left = left,
                    key = ledger.key(),
                    "escalating to full page reload"
                );
                options.hooks.notify_refresh(error, left);
                self.refresher.bust_cache_and_reload().await;
                // The page is being replaced; producing a handle here would
                // be a second terminal outcome for this chain.
                return future::pending().await;
            }
        }

        tracing::warn!(%error, "every budget exhausted, resolving fallback view");
        options.hooks.notify_failure(error);
        options.fallback_handle()
    }
}

/// Builder for [`RetryEngine`].
///
/// The refresher and the module importer are host capabilities and must be
/// supplied. The store defaults to [`MemoryStore`] and the clock to
/// [`SystemClock`].
pub struct RetryEngineBuilder {
    store: Option<Arc<dyn SessionStore>>,
    refresher: Option<Arc<dyn Refresher>>,
    importer: Option<Arc<dyn ModuleImporter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RetryEngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            refresher: None,
            importer: None,
            clock: None,
        }
    }

    /// Set the session store backing persisted refresh counters.
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the cache-bust-and-reload collaborator.
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Set the module importer used for cache-busted attempts.
    pub fn importer(mut self, importer: Arc<dyn ModuleImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Override the wall clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<RetryEngine, EngineError> {
        let refresher = self
            .refresher
            .ok_or(EngineError::NotConfigured("refresher"))?;
        let importer = self
            .importer
            .ok_or(EngineError::NotConfigured("module importer"))?;

        Ok(RetryEngine {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            refresher,
            importer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl Default for RetryEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForceRefreshOptions;
    use crate::loader::{loader_from_fn, Component};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
    use std::time::Duration;

    struct Label(&'static str);

    impl Component for Label {
        fn render(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Default)]
    struct RecordingRefresher {
        invocations: AtomicU32,
    }

    #[async_trait]
    impl Refresher for RecordingRefresher {
        async fn bust_cache_and_reload(&self) {
            self.invocations.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Importer that records requested URLs and keeps failing with the
    /// module-fetch message, so every retry re-enters the rewriter.
    #[derive(Default)]
    struct RecordingImporter {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModuleImporter for RecordingImporter {
        async fn import(&self, url: &str) -> Result<ModuleHandle, LoadError> {
            self.urls.lock().push(url.to_string());
            Err(LoadError::ModuleFetch(url.to_string()))
        }
    }

    /// Clock ticking one millisecond per reading.
    struct StepClock(AtomicI64);

    impl Clock for StepClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        refresher: Arc<RecordingRefresher>,
        importer: Arc<RecordingImporter>,
        engine: RetryEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let refresher = Arc::new(RecordingRefresher::default());
        let importer = Arc::new(RecordingImporter::default());
        let engine = RetryEngine::builder()
            .store(store.clone())
            .refresher(refresher.clone())
            .importer(importer.clone())
            .clock(Arc::new(StepClock(AtomicI64::new(1))))
            .build()
            .unwrap();
        Fixture {
            store,
            refresher,
            importer,
            engine,
        }
    }

    fn always_failing_loader() -> Loader {
        loader_from_fn(|| async { Err(LoadError::Other("Failed".to_string())) })
    }

    fn flaky_loader(failures: u32) -> (Loader, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let loader = loader_from_fn(move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < failures {
                    Err(LoadError::Other("Failed".to_string()))
                } else {
                    Ok(ModuleHandle::new(Arc::new(Label("loaded"))))
                }
            }
        });
        (loader, calls)
    }

    fn short_interval(options: RetryOptions) -> RetryOptions {
        options.interval(Duration::from_millis(1))
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_resolve_fallback_and_report_failure_once() {
        let fx = fixture();
        let failures = Arc::new(AtomicU32::new(0));
        let retries = Arc::new(AtomicU32::new(0));

        let seen_failures = Arc::clone(&failures);
        let seen_retries = Arc::clone(&retries);
        let options = short_interval(
            RetryOptions::new()
                .retries(0)
                .fail_fallback(Arc::new(Label("fallback")))
                .on_failure(move |_| {
                    seen_failures.fetch_add(1, Ordering::SeqCst);
                })
                .on_retry(move |_, _| {
                    seen_retries.fetch_add(1, Ordering::SeqCst);
                }),
        );

        let handle = fx.engine.attempt_load(always_failing_loader(), &options).await;

        assert_eq!(handle.render(), "fallback");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(retries.load(Ordering::SeqCst), 0);
        assert_eq!(fx.refresher.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_without_fallback_resolves_empty_view() {
        let fx = fixture();
        let options = short_interval(RetryOptions::new().retries(0));

        let handle = fx.engine.attempt_load(always_failing_loader(), &options).await;

        assert_eq!(handle.render(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_report_decreasing_budget_then_succeed() {
        let fx = fixture();
        let (loader, calls) = flaky_loader(3);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let record = Arc::clone(&seen);
        let options = short_interval(RetryOptions::new().retries(3).on_retry(
            move |_, retries_left| {
                record.lock().push(retries_left);
            },
        ));

        let handle = fx.engine.attempt_load(loader, &options).await;

        assert_eq!(handle.render(), "loaded");
        assert_eq!(*seen.lock(), vec![2, 1, 0]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn no_hooks_is_a_valid_no_op_path() {
        let fx = fixture();
        let (loader, _) = flaky_loader(2);
        let options = short_interval(RetryOptions::new().retries(2));

        let handle = fx.engine.attempt_load(loader, &options).await;

        assert_eq!(handle.render(), "loaded");
    }

    #[tokio::test(start_paused = true)]
    async fn first_exhaustion_escalates_persists_and_reloads() {
        let fx = fixture();
        let refreshes = Arc::new(Mutex::new(Vec::new()));

        let record = Arc::clone(&refreshes);
        let options = short_interval(
            RetryOptions::new()
                .retries(0)
                .force_refresh(ForceRefreshOptions::new("hello").refresh_retries(3))
                .on_refresh(move |_, refreshes_left| {
                    record.lock().push(refreshes_left);
                }),
        );

        // The chain hands control to the page reload and never resolves.
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            fx.engine.attempt_load(always_failing_loader(), &options),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(*refreshes.lock(), vec![2]);
        assert_eq!(
            fx.store.get("retry-lazy-refresh-for-hello").as_deref(),
            Some("2")
        );
        assert_eq!(fx.refresher.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persisted_counter_wins_over_configured_budget() {
        let fx = fixture();
        fx.store.set("retry-lazy-refresh-for-hello", "1");
        let refreshes = Arc::new(Mutex::new(Vec::new()));

        let record = Arc::clone(&refreshes);
        let options = short_interval(
            RetryOptions::new()
                .retries(0)
                .force_refresh(ForceRefreshOptions::new("hello").refresh_retries(5))
                .on_refresh(move |_, refreshes_left| {
                    record.lock().push(refreshes_left);
                }),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            fx.engine.attempt_load(always_failing_loader(), &options),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(*refreshes.lock(), vec![0]);
        assert_eq!(
            fx.store.get("retry-lazy-refresh-for-hello").as_deref(),
            Some("0")
        );
        assert_eq!(fx.refresher.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spent_persisted_budget_falls_back_without_reloading() {
        let fx = fixture();
        fx.store.set("retry-lazy-refresh-for-hello", "0");
        let failures = Arc::new(AtomicU32::new(0));

        let seen = Arc::clone(&failures);
        let options = short_interval(
            RetryOptions::new()
                .retries(0)
                .force_refresh(ForceRefreshOptions::new("hello").refresh_retries(2))
                .fail_fallback(Arc::new(Label("fallback")))
                .on_failure(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
        );

        let handle = fx.engine.attempt_load(always_failing_loader(), &options).await;

        assert_eq!(handle.render(), "fallback");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(fx.refresher.invocations.load(Ordering::SeqCst), 0);
        assert_eq!(
            fx.store.get("retry-lazy-refresh-for-hello").as_deref(),
            Some("0")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cache_busted_retries_use_fresh_timestamps() {
        let fx = fixture();
        let loader = loader_from_fn(|| async {
            Err(LoadError::ModuleFetch(
                "https://app.example.com/assets/chunk.js".to_string(),
            ))
        });
        let options = short_interval(RetryOptions::new().retries(2));

        let handle = fx.engine.attempt_load(loader, &options).await;
        assert_eq!(handle.render(), "");

        let urls = fx.importer.urls.lock().clone();
        assert_eq!(
            urls,
            vec![
                "https://app.example.com/assets/chunk.js?t=1",
                "https://app.example.com/assets/chunk.js?t=2",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_url_failures_retry_the_original_loader() {
        let fx = fixture();
        let (loader, calls) = flaky_loader(2);
        let options = short_interval(RetryOptions::new().retries(2));

        let handle = fx.engine.attempt_load(loader, &options).await;

        assert_eq!(handle.render(), "loaded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(fx.importer.urls.lock().is_empty());
    }

    #[test]
    fn builder_requires_host_collaborators() {
        let missing_refresher = RetryEngine::builder()
            .importer(Arc::new(RecordingImporter::default()))
            .build();
        assert!(matches!(
            missing_refresher,
            Err(EngineError::NotConfigured("refresher"))
        ));

        let missing_importer = RetryEngine::builder()
            .refresher(Arc::new(RecordingRefresher::default()))
            .build();
        assert!(matches!(
            missing_importer,
            Err(EngineError::NotConfigured("module importer"))
        ));
    }
}
