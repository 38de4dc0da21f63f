//! Cache-busting URL rewriting for failed module fetches.
//!
//! A stale-chunk failure names the module URL in its message. When it does,
//! the next attempt goes to the same URL with a uniquifying `t` query
//! parameter so browser and intermediate caches are bypassed.

use url::Url;

use crate::loader::{LoadError, MODULE_FETCH_PREFIX};

/// Millisecond wall-clock source, injectable for tests.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// System time via `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Rewrite the failing module URL with a fresh cache-busting parameter.
///
/// Strips the module-fetch prefix from the error's display form and parses
/// the remainder as a URL, replacing any `t` parameter already present with
/// `t=<now_millis>`. Returns `None` when the message is not URL-shaped; the
/// caller then retries the unmodified loader.
pub fn cache_busted_url(error: &LoadError, now_millis: i64) -> Option<Url> {
    let message = error.to_string();
    let stripped = message.replacen(MODULE_FETCH_PREFIX, "", 1);
    let mut url = Url::parse(stripped.trim()).ok()?;
    set_bust_param(&mut url, now_millis);
    Some(url)
}

fn set_bust_param(url: &mut Url, now_millis: i64) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "t")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    pairs.extend_pairs(kept);
    pairs.append_pair("t", &now_millis.to_string());
}
