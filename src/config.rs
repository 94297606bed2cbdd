//! Cache configuration.
//!
//! Built from defaults, deserialized from any serde source, or read from the
//! environment with [`FetchCacheConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::FetchError;

pub const ENV_REVALIDATION: &str = "FETCH_CACHE_REVALIDATION";
pub const ENV_COALESCE: &str = "FETCH_CACHE_COALESCE";
pub const ENV_STORE: &str = "FETCH_CACHE_STORE";
pub const ENV_MAX_CAPACITY: &str = "FETCH_CACHE_MAX_CAPACITY";

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// How an entry past its window (or invalidated) is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevalidationMode {
    /// Fetch inline and return the fresh payload.
    #[default]
    Blocking,
    /// Return the stale payload and refresh on a spawned task.
    Background,
}

impl FromStr for RevalidationMode {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(RevalidationMode::Blocking),
            "background" => Ok(RevalidationMode::Background),
            other => Err(FetchError::Config(format!(
                "unknown revalidation mode '{}', expected 'blocking' or 'background'",
                other
            ))),
        }
    }
}

/// Which store backs the cache when none is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Moka,
    HashMap,
}

impl FromStr for StoreKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moka" => Ok(StoreKind::Moka),
            "hashmap" => Ok(StoreKind::HashMap),
            other => Err(FetchError::Config(format!(
                "unknown store '{}', expected 'moka' or 'hashmap'",
                other
            ))),
        }
    }
}

/// Configuration for a [`FetchCache`](crate::FetchCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchCacheConfig {
    pub revalidation: RevalidationMode,
    /// Collapse concurrent refreshes of one key from different passes into one fetch.
    pub coalesce_in_flight: bool,
    pub store: StoreKind,
    /// Capacity of the default store.
    pub max_capacity: u64,
}

impl Default for FetchCacheConfig {
    fn default() -> Self {
        Self {
            revalidation: RevalidationMode::default(),
            coalesce_in_flight: true,
            store: StoreKind::default(),
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl FetchCacheConfig {
    /// Read configuration from `FETCH_CACHE_*` environment variables.
    ///
    /// Unset variables keep their defaults; invalid ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_REVALIDATION) {
            match raw.parse() {
                Ok(mode) => config.revalidation = mode,
                Err(err) => tracing::warn!(var = ENV_REVALIDATION, %err, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_COALESCE) {
            match Self::parse_bool(&raw) {
                Ok(flag) => config.coalesce_in_flight = flag,
                Err(err) => tracing::warn!(var = ENV_COALESCE, %err, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_STORE) {
            match raw.parse() {
                Ok(store) => config.store = store,
                Err(err) => tracing::warn!(var = ENV_STORE, %err, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_MAX_CAPACITY) {
            match Self::parse_capacity(&raw) {
                Ok(capacity) => config.max_capacity = capacity,
                Err(err) => tracing::warn!(var = ENV_MAX_CAPACITY, %err, "ignoring invalid value"),
            }
        }

        config
    }

    pub fn parse_bool(raw: &str) -> Result<bool, FetchError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(FetchError::Config(format!("expected a boolean, got '{}'", other))),
        }
    }

    pub fn parse_capacity(raw: &str) -> Result<u64, FetchError> {
        match raw.trim().parse::<u64>() {
            Ok(0) => Err(FetchError::Config("capacity must be positive".to_string())),
            Ok(capacity) => Ok(capacity),
            Err(e) => Err(FetchError::Config(format!("invalid capacity '{}': {}", raw, e))),
        }
    }
}
