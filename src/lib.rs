//! fetch-cache - A strategy-driven fetch cache for Rust
//!
//! This library decides, per request, whether to serve a stored response,
//! fetch and store a new one, or fetch without storing:
//! - Four caching strategies: forever, no-store, time-based revalidation and
//!   tag-scoped revalidation
//! - Serve-stale-on-error for stored entries
//! - Request deduplication within a rendering pass
//! - On-demand invalidation by tag
//!
//! # Example
//!
//! ```ignore
//! use fetch_cache::{DemoOrigin, FetchCacheBuilder, FetchClient, FetchRequest, OriginTransport, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetch_cache::FetchError> {
//!     let origin = Arc::new(DemoOrigin::new(Arc::new(SystemClock)));
//!     let client = FetchClient::new(
//!         FetchCacheBuilder::from_env().build(),
//!         Arc::new(OriginTransport::new(origin)?),
//!     );
//!
//!     // One pass per rendered page
//!     let pass = client.begin_pass();
//!     let request = FetchRequest::tagged("/api/products", ["products"], Duration::from_secs(3600));
//!     let products = client.fetch(&pass, &request).await?;
//!
//!     // Later, after the catalog changes
//!     client.invalidate_tag("products");
//!     Ok(())
//! }
//! ```

mod builder;
mod cache;
mod client;
mod clock;
mod config;
mod entry;
mod error;
pub mod origin;
mod pass;
mod store;
pub mod stores;
mod strategy;
mod tags;
mod transport;
mod utils;

// Re-export public API
pub use builder::FetchCacheBuilder;
pub use cache::FetchCache;
pub use client::FetchClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FetchCacheConfig, RevalidationMode, StoreKind};
pub use entry::{CacheEntry, Payload};
pub use error::FetchError;
pub use origin::{DemoOrigin, OriginTransport};
pub use pass::RenderPass;
pub use store::{EvictionListener, EvictionListeners, Store};
pub use stores::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
pub use stores::metrics::{
    CacheMetric, MetricsSink, MetricsStore, StatsSink, StoreStats, TracingSink,
};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use strategy::{CacheKey, FetchRequest, Strategy};
pub use tags::{Generation, TagRegistry};
pub use transport::{HttpTransport, HttpTransportConfig, Transport};
