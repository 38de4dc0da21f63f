//! The deferred module model: components, module handles, loaders and the
//! platform import hook.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use url::Url;

/// Message prefix browsers use when a dynamically imported module cannot be
/// fetched. The retry engine strips it to recover the failing module URL.
pub const MODULE_FETCH_PREFIX: &str = "Failed to fetch dynamically imported module: ";

/// Errors produced by loaders and module importers.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// The platform failed to fetch a dynamically imported module. The
    /// display form carries the module URL so the next attempt can be
    /// cache-busted.
    #[error("{}{}", MODULE_FETCH_PREFIX, .0)]
    ModuleFetch(String),

    /// Any other load failure. Retried against the unmodified loader.
    #[error("{0}")]
    Other(String),
}

/// A renderable view.
pub trait Component: Send + Sync {
    /// Render the component to its textual representation.
    fn render(&self) -> String;
}

/// Placeholder that renders nothing.
///
/// Used as the terminal fallback when the caller supplies none, so an
/// exhausted load degrades silently instead of crashing the view.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyView;

impl Component for EmptyView {
    fn render(&self) -> String {
        String::new()
    }
}

/// Handle to a successfully loaded module, wrapping its default-exported
/// component.
#[derive(Clone)]
pub struct ModuleHandle {
    component: Arc<dyn Component>,
}

impl ModuleHandle {
    /// Wrap a component as a module's default export.
    pub fn new(component: Arc<dyn Component>) -> Self {
        Self { component }
    }

    /// The module's default export.
    pub fn component(&self) -> Arc<dyn Component> {
        Arc::clone(&self.component)
    }

    /// Render the default export.
    pub fn render(&self) -> String {
        self.component.render()
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("component", &"<component>")
            .finish()
    }
}

/// A zero-argument deferred module load.
///
/// Stateless and re-invocable; the engine may swap it for a URL-rewritten
/// variant mid-chain.
pub type Loader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ModuleHandle, LoadError>> + Send + Sync>;

/// Build a [`Loader`] from a plain async closure.
pub fn loader_from_fn<F, Fut>(f: F) -> Loader
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ModuleHandle, LoadError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Platform hook that fetches a module by URL.
///
/// This is how a rewritten, cache-busted URL becomes a loader for the next
/// attempt. On the web platform this is a dynamic `import()`.
#[async_trait]
pub trait ModuleImporter: Send + Sync {
    /// Fetch and instantiate the module at `url`.
    async fn import(&self, url: &str) -> Result<ModuleHandle, LoadError>;
}

/// Loader bound to a fixed, already rewritten URL.
pub(crate) fn loader_from_url(importer: Arc<dyn ModuleImporter>, url: Url) -> Loader {
    Arc::new(move || {
        let importer = Arc::clone(&importer);
        let url = url.to_string();
        Box::pin(async move { importer.import(&url).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_fetch_error_carries_the_wire_prefix() {
        let error = LoadError::ModuleFetch("https://cdn.example.com/chunk.js".to_string());
        assert_eq!(
            error.to_string(),
            "Failed to fetch dynamically imported module: https://cdn.example.com/chunk.js"
        );
    }

    #[test]
    fn empty_view_renders_nothing() {
        assert_eq!(EmptyView.render(), "");
        assert_eq!(ModuleHandle::new(Arc::new(EmptyView)).render(), "");
    }

    #[tokio::test]
    async fn loader_from_fn_is_reinvocable() {
        struct Greeting;
        impl Component for Greeting {
            fn render(&self) -> String {
                "hi".to_string()
            }
        }

        let loader = loader_from_fn(|| async { Ok(ModuleHandle::new(Arc::new(Greeting))) });
        let first = loader().await.unwrap();
        let second = loader().await.unwrap();
        assert_eq!(first.render(), "hi");
        assert_eq!(second.render(), "hi");
    }
}
