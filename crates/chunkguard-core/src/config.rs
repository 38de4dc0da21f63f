//! Retry policy configuration and notification hooks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::{Component, EmptyView, LoadError, ModuleHandle};

fn default_retries() -> u32 {
    2
}

fn default_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_refresh_retries() -> u32 {
    0
}

fn default_cache_key_prefix() -> String {
    "retry-lazy-refresh-for".to_string()
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Guarded full-page refresh escalation.
///
/// Escalation abandons in-page retries in favor of a cache-bust-and-reload.
/// The remaining budget is persisted under
/// `"{cache_key_prefix}-{session_cache_key}"` so a freshly reloaded page
/// cannot start the loop over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceRefreshOptions {
    /// Page refresh budget once in-page retries are exhausted. Zero leaves
    /// escalation disabled.
    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: u32,

    /// Prefix of the storage key holding the surviving refresh budget.
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,

    /// Logical identifier of the guarded component. Must be unique per
    /// component so refresh loops for different views stay independent.
    pub session_cache_key: String,
}

impl ForceRefreshOptions {
    /// Escalation options for one component key, with defaults otherwise.
    pub fn new(session_cache_key: impl Into<String>) -> Self {
        Self {
            refresh_retries: default_refresh_retries(),
            cache_key_prefix: default_cache_key_prefix(),
            session_cache_key: session_cache_key.into(),
        }
    }

    /// Set the page refresh budget.
    pub fn refresh_retries(mut self, retries: u32) -> Self {
        self.refresh_retries = retries;
        self
    }

    /// Override the storage key prefix.
    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }
}

/// Budgets and timing for one load chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// In-page retry budget, consulted before any refresh logic.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed wait between attempts. Milliseconds on the wire; there is no
    /// backoff.
    #[serde(default = "default_interval", with = "duration_millis")]
    pub interval: Duration,

    /// Optional refresh escalation once retries are exhausted.
    #[serde(default)]
    pub force_refresh: Option<ForceRefreshOptions>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            interval: default_interval(),
            force_refresh: None,
        }
    }
}

/// Hook observing a retry or refresh decision, with the budget remaining
/// after it.
pub type AttemptHook = Box<dyn Fn(&LoadError, u32) + Send + Sync>;

/// Hook observing terminal failure.
pub type FailureHook = Box<dyn Fn(&LoadError) + Send + Sync>;

/// Optional notification hooks, called synchronously at decision points.
///
/// Hooks are side-effect only and cannot alter control flow. They are the
/// sole way to observe terminal failure, since the wrapped load itself
/// never fails. A panicking hook is a caller bug and propagates.
#[derive(Default)]
pub struct RetryHooks {
    /// Called before each retry.
    pub on_retry: Option<AttemptHook>,

    /// Called before each page refresh escalation.
    pub on_refresh: Option<AttemptHook>,

    /// Called once when every budget is exhausted.
    pub on_failure: Option<FailureHook>,
}

impl RetryHooks {
    pub(crate) fn notify_retry(&self, error: &LoadError, retries_left: u32) {
        if let Some(hook) = &self.on_retry {
            hook(error, retries_left);
        }
    }

    pub(crate) fn notify_refresh(&self, error: &LoadError, refreshes_left: u32) {
        if let Some(hook) = &self.on_refresh {
            hook(error, refreshes_left);
        }
    }

    pub(crate) fn notify_failure(&self, error: &LoadError) {
        if let Some(hook) = &self.on_failure {
            hook(error);
        }
    }
}

impl fmt::Debug for RetryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_refresh", &self.on_refresh.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Everything one wrapped component needs: policy, fallback view, hooks.
#[derive(Default)]
pub struct RetryOptions {
    /// Budgets and timing.
    pub policy: RetryPolicy,

    /// Rendered when every budget is exhausted. [`EmptyView`] when absent.
    pub fail_fallback: Option<Arc<dyn Component>>,

    /// Notification hooks.
    pub hooks: RetryHooks,
}

impl RetryOptions {
    /// Options with the default policy, no fallback and no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying a pre-built policy.
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Set the in-page retry budget.
    pub fn retries(mut self, retries: u32) -> Self {
        self.policy.retries = retries;
        self
    }

    /// Set the wait between attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.policy.interval = interval;
        self
    }

    /// Enable refresh escalation.
    pub fn force_refresh(mut self, options: ForceRefreshOptions) -> Self {
        self.policy.force_refresh = Some(options);
        self
    }

    /// Set the terminal fallback component.
    pub fn fail_fallback(mut self, component: Arc<dyn Component>) -> Self {
        self.fail_fallback = Some(component);
        self
    }

    /// Observe retries.
    pub fn on_retry(mut self, hook: impl Fn(&LoadError, u32) + Send + Sync + 'static) -> Self {
        self.hooks.on_retry = Some(Box::new(hook));
        self
    }

    /// Observe refresh escalations.
    pub fn on_refresh(mut self, hook: impl Fn(&LoadError, u32) + Send + Sync + 'static) -> Self {
        self.hooks.on_refresh = Some(Box::new(hook));
        self
    }

    /// Observe terminal failure.
    pub fn on_failure(mut self, hook: impl Fn(&LoadError) + Send + Sync + 'static) -> Self {
        self.hooks.on_failure = Some(Box::new(hook));
        self
    }

    pub(crate) fn fallback_handle(&self) -> ModuleHandle {
        let component = self
            .fail_fallback
            .clone()
            .unwrap_or_else(|| Arc::new(EmptyView));
        ModuleHandle::new(component)
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .field("fail_fallback", &self.fail_fallback.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}
