//! # chunkguard-core
//!
//! Retry, refresh and fallback recovery for deferred (code-split) module
//! loading.
//!
//! After a redeploy, a browser holding yesterday's HTML will happily ask for
//! yesterday's chunk files; the fetch fails and, unhandled, the whole view
//! crashes. This crate wraps the deferred load in a recovery ladder:
//!
//! 1. **Retry** a bounded number of times, rewriting the module URL with a
//!    cache-busting `t` parameter whenever the failure names one.
//! 2. **Refresh**: escalate to a full page reload, guarded by a counter
//!    persisted in the session store so reloads cannot loop.
//! 3. **Fall back** to a placeholder view once every budget is spent.
//!
//! ## Key guarantees
//!
//! 1. **No surfaced load errors**: a wrapped load resolves with a real
//!    module, resolves with a fallback view, or hands control to a page
//!    reload. Terminal failure is observable only through the `on_failure`
//!    hook.
//! 2. **Monotonic budgets**: retry and refresh budgets only decrease within
//!    a chain, and the refresh budget survives the reloads it triggers.
//! 3. **Injected host capabilities**: session storage, cache storage, page
//!    reload, module import and the wall clock are traits, so every path is
//!    testable without a browser.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chunkguard_core::{
//!     wrap_with_retry, ForceRefreshOptions, RetryEngine, RetryOptions,
//! };
//!
//! let engine = Arc::new(
//!     RetryEngine::builder()
//!         .store(platform_session_store)
//!         .refresher(platform_refresher)
//!         .importer(platform_importer)
//!         .build()?,
//! );
//!
//! let profile = wrap_with_retry(
//!     engine,
//!     profile_chunk_loader,
//!     RetryOptions::new()
//!         .retries(3)
//!         .force_refresh(ForceRefreshOptions::new("profile").refresh_retries(1))
//!         .on_failure(|error| tracing::error!(%error, "profile chunk lost")),
//! );
//!
//! let view = profile.resolve().await;
//! ```

pub mod budget;
pub mod cachebust;
pub mod config;
pub mod engine;
pub mod lazy;
pub mod loader;
pub mod reload;
pub mod store;

// Re-export main types at crate root
pub use budget::RefreshLedger;
pub use cachebust::{cache_busted_url, Clock, SystemClock};
pub use config::{
    AttemptHook, FailureHook, ForceRefreshOptions, RetryHooks, RetryOptions, RetryPolicy,
};
pub use engine::{EngineError, RetryEngine, RetryEngineBuilder};
pub use lazy::{wrap_with_retry, LazyComponent};
pub use loader::{
    loader_from_fn, Component, EmptyView, LoadError, Loader, ModuleHandle, ModuleImporter,
    MODULE_FETCH_PREFIX,
};
pub use reload::{
    CacheBustRefresher, CacheStorage, CacheStorageError, PageReloader, Refresher,
};
pub use store::{MemoryStore, SessionStore};
