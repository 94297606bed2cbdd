//! Store implementations for the cache library.

pub mod memory;
pub mod metrics;
pub mod moka;

pub use memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
pub use metrics::{CacheMetric, MetricsSink, MetricsStore, StatsSink, StoreStats, TracingSink};
pub use moka::{MokaStore, MokaStoreConfig};
