/// Error type for fetch and cache operations.
///
/// `Clone` so a single outcome can be handed to every caller that was
/// deduplicated onto the same in-flight fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The underlying fetch failed (network error or non-success response).
    #[error("transport failure for '{target}': {message}")]
    Transport { target: String, message: String },

    /// A fetch failed and there was no cached entry to fall back to.
    #[error("no cached fallback for '{key}': {source}")]
    NoFallbackAvailable {
        key: String,
        #[source]
        source: Box<FetchError>,
    },

    /// A store backend failed.
    #[error("[{tier}] store error for key '{key}': {message}")]
    Store {
        tier: String,
        key: String,
        message: String,
    },

    /// Payload encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A configuration value could not be understood.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FetchError {
    /// Create a new transport error.
    pub fn transport(target: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::Transport {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a new store error.
    pub fn store(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        FetchError::Store {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap a fetch failure that had nothing cached to fall back on.
    pub fn no_fallback(key: impl Into<String>, source: FetchError) -> Self {
        FetchError::NoFallbackAvailable {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error originated in the transport, directly or wrapped.
    pub fn is_transport(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::NoFallbackAvailable { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}
