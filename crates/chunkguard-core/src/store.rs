//! Durable per-session key-value storage.
//!
//! The refresh escalation counter must survive the page reloads it triggers,
//! so it lives in a small string store (`sessionStorage` on the web
//! platform). The trait keeps the engine testable without a browser.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Per-session string storage.
///
/// Reads and writes are synchronous and are not coordinated across
/// concurrent chains using the same key.
pub trait SessionStore: Send + Sync {
    /// Look up a stored value.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value, overwriting any previous one.
    fn set(&self, key: &str, value: &str);
}

/// In-memory store for tests and non-browser hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }
}
