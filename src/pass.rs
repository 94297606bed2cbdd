//! Request deduplication within one rendering pass.

use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cache::{FetchCache, SharedFetch};
use crate::entry::Payload;
use crate::error::FetchError;
use crate::strategy::{CacheKey, FetchRequest};
use crate::utils::lock_or_recover;

/// One logical unit of work, such as rendering a single page.
///
/// Owns the deduplication slots for that unit: identical keys resolved through
/// the same pass share one computation. Passes are created with
/// [`FetchCache::begin_pass`] and passed explicitly to whatever needs them;
/// dropping the pass discards its slots.
pub struct RenderPass {
    id: u64,
    slots: Mutex<HashMap<CacheKey, SharedFetch>>,
    computations: AtomicUsize,
}

impl RenderPass {
    pub(crate) fn new(id: u64) -> Self {
        tracing::debug!(pass = id, "render pass started");
        RenderPass {
            id,
            slots: Mutex::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve `key` at most once in this pass.
    ///
    /// The first caller for a key invokes `compute`; every later caller, including
    /// ones arriving while the first is still running, awaits that same outcome.
    /// `compute` is invoked while the slot is being claimed, so it must only build
    /// the future and not call back into this pass synchronously.
    pub async fn resolve_once<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Payload, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let shared = {
            let mut slots = lock_or_recover(&self.slots, "pass.slots");
            if let Some(existing) = slots.get(&key) {
                tracing::debug!(pass = self.id, key = %key, "deduplicated");
                existing.clone()
            } else {
                self.computations.fetch_add(1, Ordering::Relaxed);
                let shared = compute().boxed().shared();
                slots.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Resolve `request` through `cache`, deduplicated within this pass.
    pub async fn fetch<F, Fut>(
        &self,
        cache: &FetchCache,
        request: &FetchRequest,
        fetcher: F,
    ) -> Result<Payload, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let cache = cache.clone();
        let owned = request.clone();
        self.resolve_once(request.key(), move || async move {
            cache.resolve(&owned, fetcher).await
        })
        .await
    }

    /// Number of distinct keys resolved in this pass.
    pub fn slot_count(&self) -> usize {
        lock_or_recover(&self.slots, "pass.slot_count").len()
    }

    /// Number of times a computation was actually started in this pass.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        tracing::debug!(
            pass = self.id,
            slots = self.slot_count(),
            computations = self.computations(),
            "render pass finished"
        );
    }
}
