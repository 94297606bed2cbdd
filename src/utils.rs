//! Shared utilities for the cache library.

use std::fmt::Display;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Build a composite cache key from normalized options and a target.
///
/// Format: `{options}::{target}`
pub fn build_cache_key<N: Display>(options: &N, target: &str) -> String {
    format!("{}::{}", options, target)
}

/// Get the current time in milliseconds since UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// A duration in whole milliseconds, saturating at `i64::MAX`.
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(op, "recovered from poisoned lock");
            poisoned.into_inner()
        }
    }
}
