//! Refresh budget that survives the reloads it triggers.
//!
//! A full-page refresh throws away the in-memory chain, so the remaining
//! refresh budget is kept in the session store under a per-component key.
//! Once read, the persisted value always wins over the configured initial
//! budget: it reflects refreshes already spent before the current page came
//! up. The counter is never cleared here; cleanup is out of scope.

use crate::config::ForceRefreshOptions;
use crate::store::SessionStore;

/// Storage-backed view of the remaining refresh budget for one component.
pub struct RefreshLedger<'a> {
    store: &'a dyn SessionStore,
    key: String,
    initial: u32,
}

impl<'a> RefreshLedger<'a> {
    /// Ledger for the component identified by `options.session_cache_key`.
    pub fn new(store: &'a dyn SessionStore, options: &ForceRefreshOptions) -> Self {
        Self {
            store,
            key: storage_key(options),
            initial: options.refresh_retries,
        }
    }

    /// Remaining refresh budget: the persisted counter when present and
    /// well-formed, the configured initial budget otherwise.
    pub fn remaining(&self) -> u32 {
        self.store
            .get(&self.key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(self.initial)
    }

    /// Persist the budget left after spending one refresh.
    pub fn record_refresh(&self, left: u32) {
        self.store.set(&self.key, &left.to_string());
    }

    /// The storage key this ledger reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// `"{cache_key_prefix}-{session_cache_key}"`.
fn storage_key(options: &ForceRefreshOptions) -> String {
    format!("{}-{}", options.cache_key_prefix, options.session_cache_key)
}
