//! Simulated browser platform: a flaky CDN, named response caches and a
//! page that "reloads" by replacing the process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chunkguard_core::{
    CacheStorage, CacheStorageError, Component, LoadError, ModuleHandle, ModuleImporter,
    PageReloader,
};

/// The view the demo eventually manages to load.
pub struct HelloWorld;

impl Component for HelloWorld {
    fn render(&self) -> String {
        "<h1>Hello, world!</h1>".to_string()
    }
}

/// Shown when the recovery ladder runs out of budget.
pub struct FallbackBanner;

impl Component for FallbackBanner {
    fn render(&self) -> String {
        "<div>Something went wrong loading this view.</div>".to_string()
    }
}

/// CDN that keeps serving a stale deploy for the first `failures` fetches.
pub struct FlakyCdn {
    failures: u32,
    fetches: AtomicU32,
}

impl FlakyCdn {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            fetches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ModuleImporter for FlakyCdn {
    async fn import(&self, url: &str) -> Result<ModuleHandle, LoadError> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            tracing::info!(url, attempt, "CDN still serving the old deploy");
            Err(LoadError::ModuleFetch(url.to_string()))
        } else {
            tracing::info!(url, attempt, "chunk fetched");
            Ok(ModuleHandle::new(Arc::new(HelloWorld)))
        }
    }
}

/// A couple of named response caches, all deletable.
pub struct DemoCaches;

#[async_trait]
impl CacheStorage for DemoCaches {
    async fn cache_names(&self) -> Result<Vec<String>, CacheStorageError> {
        Ok(vec!["assets-v1".to_string(), "api-v1".to_string()])
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, CacheStorageError> {
        tracing::info!(name, "cache deleted");
        Ok(true)
    }
}

/// A real reload tears down the running page; ending the process is the
/// closest honest equivalent.
pub struct ExitingPage;

impl PageReloader for ExitingPage {
    fn reload(&self) {
        tracing::info!("page reload requested, replacing process");
        std::process::exit(0);
    }
}
