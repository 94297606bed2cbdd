//! Tag invalidation registry.
//!
//! Maps each tag to the entry keys carrying it (and back), and records when
//! keys were invalidated. Ordering is expressed in generations: a counter
//! bumped under the registry lock by every registration and invalidation.
//! An entry registered at generation `g` is invalid once any invalidation
//! covering its key has a generation greater than `g`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::strategy::CacheKey;
use crate::utils::lock_or_recover;

/// Registry generation number.
pub type Generation = u64;

#[derive(Debug, Default)]
struct TagIndex {
    generation: Generation,
    tag_to_keys: HashMap<String, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, HashSet<String>>,
    /// Latest registration of each key.
    registered: HashMap<CacheKey, Generation>,
    /// Most recent tag invalidation covering each key.
    invalidated: HashMap<CacheKey, Generation>,
    /// Generation of the last `invalidate_all`.
    all_invalidated: Option<Generation>,
}

impl TagIndex {
    fn next_generation(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    fn link(&mut self, tag: &str, key: &CacheKey) {
        self.tag_to_keys
            .entry(tag.to_string())
            .or_default()
            .insert(key.clone());
        self.key_to_tags
            .entry(key.clone())
            .or_default()
            .insert(tag.to_string());
    }

    fn record(&mut self, key: &CacheKey) -> Generation {
        let generation = self.next_generation();
        self.registered.insert(key.clone(), generation);
        generation
    }

    fn forget(&mut self, key: &CacheKey) {
        if let Some(tags) = self.key_to_tags.remove(key) {
            for tag in tags {
                if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tag_to_keys.remove(&tag);
                    }
                }
            }
        }
        self.registered.remove(key);
        self.invalidated.remove(key);
    }
}

/// Process-wide tag → entry index.
///
/// All reads and writes go through a single lock so lookups observe a
/// consistent view relative to concurrent invalidations.
#[derive(Debug, Default)]
pub struct TagRegistry {
    index: Mutex<TagIndex>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` to the set for `tag`. Idempotent.
    ///
    /// Returns the generation of this registration.
    pub fn register(&self, tag: &str, key: &CacheKey) -> Generation {
        let mut index = lock_or_recover(&self.index, "tags.register");
        index.link(tag, key);
        index.record(key)
    }

    /// Register `key` under every tag in `tags` as one step.
    ///
    /// Also used for untagged entries so that their generation orders them
    /// against `invalidate_all`.
    pub fn register_entry<'a, I>(&self, key: &CacheKey, tags: I) -> Generation
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = lock_or_recover(&self.index, "tags.register_entry");
        for tag in tags {
            index.link(tag, key);
        }
        index.record(key)
    }

    /// Invalidate every key currently registered under `tag`.
    ///
    /// Returns the number of keys affected. Keys registered after this call
    /// returns are not affected.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut index = lock_or_recover(&self.index, "tags.invalidate_tag");
        let generation = index.next_generation();

        let keys: Vec<CacheKey> = index
            .tag_to_keys
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        for key in &keys {
            index.invalidated.insert(key.clone(), generation);
        }

        tracing::info!(tag, affected = keys.len(), generation, "invalidated tag");
        keys.len()
    }

    /// Invalidate every entry registered so far, tagged or not.
    ///
    /// Returns the number of tagged keys known to the registry at the time.
    pub fn invalidate_all(&self) -> usize {
        let mut index = lock_or_recover(&self.index, "tags.invalidate_all");
        let generation = index.next_generation();
        index.all_invalidated = Some(generation);
        // Superseded by the global mark
        index.invalidated.clear();

        let known = index.key_to_tags.len();
        tracing::info!(known, generation, "invalidated all entries");
        known
    }

    /// Whether an entry registered at `generation` has since been invalidated.
    pub fn is_invalidated(&self, key: &CacheKey, generation: Generation) -> bool {
        let index = lock_or_recover(&self.index, "tags.is_invalidated");

        if index.all_invalidated.is_some_and(|all| all > generation) {
            return true;
        }

        index
            .invalidated
            .get(key)
            .is_some_and(|invalidated| *invalidated > generation)
    }

    /// Drop every mapping for `key`.
    pub fn unregister(&self, key: &CacheKey) {
        lock_or_recover(&self.index, "tags.unregister").forget(key);
    }

    /// Drop every mapping for `key` unless it was registered again after
    /// `generation`.
    ///
    /// Called when the entry registered at `generation` leaves the store
    /// (evicted, or never written). Returns whether the mappings were dropped.
    pub fn release(&self, key: &CacheKey, generation: Generation) -> bool {
        let mut index = lock_or_recover(&self.index, "tags.release");

        if index
            .registered
            .get(key)
            .is_some_and(|latest| *latest > generation)
        {
            return false;
        }
        index.forget(key);
        true
    }

    /// Undo the registration made at `attempted` when its fetch failed and
    /// the entry stored at `previous` stays in place.
    pub fn rollback(&self, key: &CacheKey, attempted: Generation, previous: Generation) {
        let mut index = lock_or_recover(&self.index, "tags.rollback");

        if let Some(latest) = index.registered.get_mut(key) {
            if *latest == attempted {
                *latest = previous;
            }
        }
    }

    /// Number of keys with a live registration, tagged or not.
    pub fn registered_count(&self) -> usize {
        lock_or_recover(&self.index, "tags.registered_count")
            .registered
            .len()
    }

    /// Keys currently registered under `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> HashSet<CacheKey> {
        lock_or_recover(&self.index, "tags.keys_for_tag")
            .tag_to_keys
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Tags `key` is registered under.
    pub fn tags_for_key(&self, key: &CacheKey) -> HashSet<String> {
        lock_or_recover(&self.index, "tags.tags_for_key")
            .key_to_tags
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of tags with at least one registered key.
    pub fn tag_count(&self) -> usize {
        lock_or_recover(&self.index, "tags.tag_count")
            .tag_to_keys
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use std::time::Duration;

    fn key(target: &str, tags: &[&str]) -> CacheKey {
        CacheKey::new(
            target,
            &Strategy::tagged(tags.iter().copied(), Duration::from_secs(3600)),
        )
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = TagRegistry::new();
        let k = key("/api/products", &["products-all"]);

        registry.register("products-all", &k);
        registry.register("products-all", &k);

        assert_eq!(registry.keys_for_tag("products-all").len(), 1);
        assert_eq!(registry.tags_for_key(&k).len(), 1);
    }

    #[test]
    fn test_invalidate_tag_targets_only_tagged_keys() {
        let registry = TagRegistry::new();
        let a = key("/a", &["a"]);
        let b = key("/b", &["b"]);
        let ab = key("/ab", &["a", "b"]);

        let ga = registry.register_entry(&a, ["a"]);
        let gb = registry.register_entry(&b, ["b"]);
        let gab = registry.register_entry(&ab, ["a", "b"]);

        assert_eq!(registry.invalidate_tag("a"), 2);

        assert!(registry.is_invalidated(&a, ga));
        assert!(registry.is_invalidated(&ab, gab));
        assert!(!registry.is_invalidated(&b, gb));
    }

    #[test]
    fn test_registration_after_invalidation_is_unaffected() {
        let registry = TagRegistry::new();
        let k = key("/books", &["products-books"]);

        let before = registry.register_entry(&k, ["products-books"]);
        registry.invalidate_tag("products-books");
        let after = registry.register_entry(&k, ["products-books"]);

        assert!(registry.is_invalidated(&k, before));
        assert!(!registry.is_invalidated(&k, after));
    }

    #[test]
    fn test_invalidate_unknown_tag_is_noop() {
        let registry = TagRegistry::new();
        let k = key("/x", &["x"]);
        let g = registry.register_entry(&k, ["x"]);

        assert_eq!(registry.invalidate_tag("missing"), 0);
        assert!(!registry.is_invalidated(&k, g));
    }

    #[test]
    fn test_invalidate_all_covers_untagged_entries() {
        let registry = TagRegistry::new();
        let untagged = CacheKey::new("/api/logs", &Strategy::Forever);
        let tagged = key("/t", &["t"]);

        let g1 = registry.register_entry(&untagged, []);
        let g2 = registry.register_entry(&tagged, ["t"]);
        registry.invalidate_all();
        let g3 = registry.register_entry(&untagged, []);

        assert!(registry.is_invalidated(&untagged, g1));
        assert!(registry.is_invalidated(&tagged, g2));
        assert!(!registry.is_invalidated(&untagged, g3));
    }

    #[test]
    fn test_unregister_cleans_both_directions() {
        let registry = TagRegistry::new();
        let k = key("/ab", &["a", "b"]);
        registry.register_entry(&k, ["a", "b"]);
        assert_eq!(registry.tag_count(), 2);

        registry.unregister(&k);

        assert_eq!(registry.tag_count(), 0);
        assert!(registry.tags_for_key(&k).is_empty());
        assert!(registry.keys_for_tag("a").is_empty());
    }

    #[test]
    fn test_release_skips_newer_registration() {
        let registry = TagRegistry::new();
        let k = key("/books", &["products-books"]);

        let evicted = registry.register_entry(&k, ["products-books"]);
        let refetched = registry.register_entry(&k, ["products-books"]);

        assert!(!registry.release(&k, evicted));
        assert_eq!(registry.keys_for_tag("products-books").len(), 1);

        assert!(registry.release(&k, refetched));
        assert!(registry.keys_for_tag("products-books").is_empty());
        assert_eq!(registry.registered_count(), 0);
    }

    #[test]
    fn test_release_clears_invalidation_mark() {
        let registry = TagRegistry::new();
        let k = key("/t", &["t"]);
        let g = registry.register_entry(&k, ["t"]);
        registry.invalidate_tag("t");

        assert!(registry.release(&k, g));
        assert_eq!(registry.invalidate_tag("t"), 0);
        assert!(!registry.is_invalidated(&k, g));
    }

    #[test]
    fn test_rollback_restores_previous_registration() {
        let registry = TagRegistry::new();
        let k = key("/t", &["t"]);
        let stored = registry.register_entry(&k, ["t"]);
        let failed = registry.register_entry(&k, ["t"]);

        registry.rollback(&k, failed, stored);

        // Evicting the surviving entry now cleans up
        assert!(registry.release(&k, stored));
        assert!(registry.tags_for_key(&k).is_empty());
    }

    #[test]
    fn test_concurrent_registers_observe_invalidation() {
        let registry = std::sync::Arc::new(TagRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let k = key(&format!("/p/{i}"), &["shared"]);
                    (k.clone(), registry.register_entry(&k, ["shared"]))
                })
            })
            .collect();
        let registered: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.invalidate_tag("shared"), 8);
        for (k, g) in registered {
            assert!(registry.is_invalidated(&k, g));
        }
    }
}
