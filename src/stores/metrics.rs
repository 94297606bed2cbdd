//! Store instrumentation.
//!
//! `MetricsStore` wraps any store and reports every read, write and remove
//! to a `MetricsSink`. Two sinks ship with the crate: `TracingSink` logs each
//! event, `StatsSink` keeps running counters.
//!
//! # Example
//!
//! ```ignore
//! let moka: Arc<dyn Store> = Arc::new(MokaStore::new(MokaStoreConfig::default()));
//! let stats = Arc::new(StatsSink::default());
//! let store: Arc<dyn Store> = Arc::new(MetricsStore::new(moka, stats.clone()));
//! let cache = FetchCacheBuilder::new().store(store).build();
//!
//! // ... serve some pages ...
//! println!("hit rate: {:.2}", stats.snapshot().hit_rate());
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::store::{EvictionListener, Store};
use crate::strategy::CacheKey;

/// One instrumented store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMetric {
    Read {
        key: String,
        hit: bool,
        latency_ms: f64,
        /// `Store::name()` of the wrapped store.
        tier: &'static str,
    },
    Write {
        key: String,
        tag_count: usize,
        latency_ms: f64,
        tier: &'static str,
        failed: bool,
    },
    Remove {
        key_count: usize,
        first_key: Option<String>,
        latency_ms: f64,
        tier: &'static str,
    },
}

/// Receives store metrics. `emit` runs inline with the store call.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    fn emit(&self, metric: CacheMetric);

    /// Flush anything buffered. The default does nothing.
    async fn flush(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Logs each metric at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn emit(&self, metric: CacheMetric) {
        match metric {
            CacheMetric::Read { key, hit, latency_ms, tier } => {
                tracing::debug!(%key, hit, latency_ms, tier, "store read")
            }
            CacheMetric::Write { key, tag_count, latency_ms, tier, failed } => {
                tracing::debug!(%key, tag_count, latency_ms, tier, failed, "store write")
            }
            CacheMetric::Remove { key_count, first_key, latency_ms, tier } => {
                tracing::debug!(key_count, ?first_key, latency_ms, tier, "store remove")
            }
        }
    }
}

/// Point-in-time copy of [`StatsSink`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub failed_writes: u64,
    pub removed_keys: u64,
}

impl StoreStats {
    /// Fraction of reads that found an entry. Zero before the first read.
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

/// Counts hits, misses, writes and removals.
#[derive(Debug, Default)]
pub struct StatsSink {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    failed_writes: AtomicU64,
    removed_keys: AtomicU64,
}

impl StatsSink {
    pub fn snapshot(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            removed_keys: self.removed_keys.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl MetricsSink for StatsSink {
    fn emit(&self, metric: CacheMetric) {
        let counter = match metric {
            CacheMetric::Read { hit: true, .. } => &self.hits,
            CacheMetric::Read { hit: false, .. } => &self.misses,
            CacheMetric::Write { failed: false, .. } => &self.writes,
            CacheMetric::Write { failed: true, .. } => &self.failed_writes,
            CacheMetric::Remove { key_count, .. } => {
                self.removed_keys.fetch_add(key_count as u64, Ordering::Relaxed);
                return;
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Logs the totals so far at info level.
    async fn flush(&self) -> Result<(), FetchError> {
        let stats = self.snapshot();
        tracing::info!(
            hits = stats.hits,
            misses = stats.misses,
            writes = stats.writes,
            failed_writes = stats.failed_writes,
            removed_keys = stats.removed_keys,
            hit_rate = stats.hit_rate(),
            "store stats"
        );
        Ok(())
    }
}

/// Store decorator reporting every operation to a sink.
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsStore {
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        MetricsStore { inner, sink }
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }
}

fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl Store for MetricsStore {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, FetchError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            hit: matches!(result, Ok(Some(_))),
            latency_ms: millis_since(start),
            tier: self.inner.name(),
        });
        result
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), FetchError> {
        let (key, tag_count) = (entry.key.to_string(), entry.tags.len());
        let start = Instant::now();
        let result = self.inner.set(entry).await;

        self.sink.emit(CacheMetric::Write {
            key,
            tag_count,
            latency_ms: millis_since(start),
            tier: self.inner.name(),
            failed: result.is_err(),
        });
        result
    }

    async fn remove(&self, keys: &[CacheKey]) -> Result<(), FetchError> {
        let start = Instant::now();
        let result = self.inner.remove(keys).await;

        self.sink.emit(CacheMetric::Remove {
            key_count: keys.len(),
            first_key: keys.first().map(ToString::to_string),
            latency_ms: millis_since(start),
            tier: self.inner.name(),
        });
        result
    }

    fn on_evict(&self, listener: EvictionListener) {
        self.inner.on_evict(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Payload;
    use crate::stores::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
    use crate::strategy::Strategy;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<CacheMetric>>);

    impl MetricsSink for RecordingSink {
        fn emit(&self, metric: CacheMetric) {
            self.0.lock().unwrap().push(metric);
        }
    }

    fn wrapped(sink: Arc<dyn MetricsSink>) -> MetricsStore {
        MetricsStore::new(Arc::new(HashMapStore::new(HashMapStoreConfig::default())), sink)
    }

    fn books_entry() -> CacheEntry {
        let strategy =
            Strategy::tagged(["products-all", "products-books"], Duration::from_secs(60));
        let key = CacheKey::new("/api/products?category=books", &strategy);
        CacheEntry::new(key, Payload::new(json!([])), 0, strategy, 1)
    }

    #[tokio::test]
    async fn test_write_reports_tags_and_tier() {
        let sink = Arc::new(RecordingSink::default());
        let store = wrapped(sink.clone());

        let entry = books_entry();
        let key = entry.key.to_string();
        store.set(entry).await.unwrap();

        let metrics = sink.0.lock().unwrap().clone();
        match metrics.as_slice() {
            [CacheMetric::Write { key: written, tag_count, tier, failed, .. }] => {
                assert_eq!(written, &key);
                assert_eq!(*tag_count, 2);
                assert_eq!(*tier, "hashmap");
                assert!(!failed);
            }
            other => panic!("Expected one Write metric, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_sink_counts_hits_and_misses() {
        let stats = Arc::new(StatsSink::default());
        let store = wrapped(stats.clone());
        let entry = books_entry();
        let key = entry.key.clone();

        assert!(store.get(&key).await.unwrap().is_none());
        store.set(entry).await.unwrap();
        for _ in 0..3 {
            assert!(store.get(&key).await.unwrap().is_some());
        }
        store
            .remove(&[key, CacheKey::new("/missing", &Strategy::Forever)])
            .await
            .unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.removed_keys, 2);
        assert_eq!(snapshot.hit_rate(), 0.75);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_metrics() {
        let store = wrapped(Arc::new(TracingSink));

        store.set(books_entry()).await.unwrap();
        store.remove(&[]).await.unwrap();

        assert!(store.sink().flush().await.is_ok());
        assert_eq!(store.name(), "metrics");
        assert_eq!(StoreStats::default().hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_evictions_pass_through_wrapper() {
        let inner = HashMapStore::new(HashMapStoreConfig {
            evict_on_set: Some(EvictOnSetConfig {
                frequency: 1.0,
                max_items: 1,
            }),
        });
        let store = MetricsStore::new(Arc::new(inner), Arc::new(StatsSink::default()));
        let evicted = Arc::new(AtomicUsize::new(0));
        let seen = evicted.clone();
        store.on_evict(Arc::new(move |_: &CacheEntry| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.set(books_entry()).await.unwrap();
        let key = CacheKey::new("/api/logs", &Strategy::Forever);
        store
            .set(CacheEntry::new(key, Payload::new(json!([])), 1, Strategy::Forever, 2))
            .await
            .unwrap();

        assert_eq!(evicted.load(Ordering::SeqCst), 1);
        assert!(store.sink().flush().await.is_ok());
    }
}
