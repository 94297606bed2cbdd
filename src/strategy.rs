//! Caching strategies and the keys derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::utils::build_cache_key;

/// The caching policy declared on a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Store once, serve until restart or explicit invalidation.
    Forever,
    /// Never read or write the store.
    NoStore,
    /// Serve the stored entry while it is younger than the window.
    RevalidateAfter(Duration),
    /// Time-based like `RevalidateAfter`, and also invalidated through any of its tags.
    TaggedRevalidate {
        tags: BTreeSet<String>,
        after: Duration,
    },
}

impl Strategy {
    /// Build a tagged strategy. Tag order and duplicates do not matter.
    pub fn tagged<I, T>(tags: I, after: Duration) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Strategy::TaggedRevalidate {
            tags: tags.into_iter().map(Into::into).collect(),
            after,
        }
    }

    /// Tags attached to this strategy. Empty for untagged strategies.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        let tags = match self {
            Strategy::TaggedRevalidate { tags, .. } => Some(tags),
            _ => None,
        };
        tags.into_iter().flatten().map(String::as_str)
    }

    /// Revalidation window, if the strategy has one.
    pub fn window(&self) -> Option<Duration> {
        match self {
            Strategy::RevalidateAfter(after) | Strategy::TaggedRevalidate { after, .. } => {
                Some(*after)
            }
            Strategy::Forever | Strategy::NoStore => None,
        }
    }

    /// Whether responses fetched under this strategy are written to the store.
    pub fn is_stored(&self) -> bool {
        !matches!(self, Strategy::NoStore)
    }

    /// Canonical option string. Equal strings mean equal cache behavior.
    pub fn normalized(&self) -> String {
        match self {
            Strategy::Forever => "force-cache".to_string(),
            Strategy::NoStore => "no-store".to_string(),
            Strategy::RevalidateAfter(after) => format!("revalidate={}", window_label(after)),
            Strategy::TaggedRevalidate { tags, after } => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                format!("revalidate={};tags={}", window_label(after), tags.join(","))
            }
        }
    }
}

// Whole seconds print as seconds, anything finer keeps millisecond precision.
fn window_label(after: &Duration) -> String {
    if after.subsec_millis() == 0 {
        after.as_secs().to_string()
    } else {
        format!("{}ms", after.as_millis())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Identity of a cache entry and of a deduplication slot.
///
/// Two requests share an entry iff their targets and normalized options match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    target: String,
    options: String,
}

impl CacheKey {
    pub fn new(target: impl Into<String>, strategy: &Strategy) -> Self {
        CacheKey {
            target: target.into(),
            options: strategy.normalized(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &str {
        &self.options
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_cache_key(&self.options, &self.target))
    }
}

/// An outbound fetch: what to fetch and how to cache it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub target: String,
    pub strategy: Strategy,
}

impl FetchRequest {
    pub fn new(target: impl Into<String>, strategy: Strategy) -> Self {
        FetchRequest {
            target: target.into(),
            strategy,
        }
    }

    /// `{ cache: "force-cache" }`
    pub fn forever(target: impl Into<String>) -> Self {
        Self::new(target, Strategy::Forever)
    }

    /// `{ cache: "no-store" }`
    pub fn no_store(target: impl Into<String>) -> Self {
        Self::new(target, Strategy::NoStore)
    }

    /// `{ next: { revalidate: secs } }`
    pub fn revalidate(target: impl Into<String>, after: Duration) -> Self {
        Self::new(target, Strategy::RevalidateAfter(after))
    }

    /// `{ next: { tags, revalidate: secs } }`
    pub fn tagged<I, T>(target: impl Into<String>, tags: I, after: Duration) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(target, Strategy::tagged(tags, after))
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.target.clone(), &self.strategy)
    }
}
