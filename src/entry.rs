use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::error::FetchError;
use crate::strategy::{CacheKey, Strategy};
use crate::utils::duration_ms;

/// A fetched response body.
///
/// Cloning is cheap and clones point at the same document, so callers that
/// were deduplicated onto one fetch receive reference-identical payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Arc<serde_json::Value>);

impl Payload {
    pub fn new(value: serde_json::Value) -> Self {
        Payload(Arc::new(value))
    }

    /// Serialize any value into a payload.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, FetchError> {
        serde_json::to_value(value)
            .map(Payload::new)
            .map_err(|e| FetchError::Serialization(format!("Serialization failed: {}", e)))
    }

    /// Decode the payload into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        T::deserialize(self.0.as_ref())
            .map_err(|e| FetchError::Serialization(format!("Deserialization failed: {}", e)))
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Whether two payloads are the same allocation, not merely equal.
    pub fn ptr_eq(a: &Payload, b: &Payload) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::new(value)
    }
}

/// A stored response and the bookkeeping needed to decide whether it may be reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,

    pub payload: Payload,

    /// Unix timestamp in milliseconds of the last successful fetch.
    pub stored_at: i64,

    pub strategy: Strategy,

    /// Empty for untagged entries.
    pub tags: Vec<String>,

    /// Registry generation at which this entry was registered.
    /// Invalidations issued at a later generation expire it.
    pub generation: u64,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        payload: Payload,
        stored_at: i64,
        strategy: Strategy,
        generation: u64,
    ) -> Self {
        let tags = strategy.tags().map(str::to_string).collect();
        CacheEntry {
            key,
            payload,
            stored_at,
            strategy,
            tags,
            generation,
        }
    }

    /// Milliseconds since the entry was stored.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.stored_at)
    }

    /// Check if the entry is inside its revalidation window.
    ///
    /// Entries without a window are always within it.
    pub fn is_within_window(&self, now_ms: i64) -> bool {
        match self.strategy.window() {
            Some(window) => self.age_ms(now_ms) < duration_ms(window),
            None => true,
        }
    }
}
