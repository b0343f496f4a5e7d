//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    /// Key absent from a cache tier.
    ///
    /// Drives fallback to the next tier (or recomputation) inside the
    /// orchestrator and never reaches the caller of a cached function.
    #[error("key not found in {tier} cache")]
    KeyNotFound { tier: &'static str },

    // Disk tier errors
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted entry written by a newer format than this build understands.
    #[error("unsupported cache entry version {found} (max supported: {max})")]
    UnsupportedVersion { found: u32, max: u32 },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A value reachable from a cached call's arguments or return value has
    /// no usable fingerprint and no hash override was supplied for its type.
    ///
    /// `path` locates the offending value within the traversed structure,
    /// e.g. `args.[2].connection`.
    #[error("cannot fingerprint value of type `{type_name}` at {path}; supply a hash override for this type")]
    Unhashable {
        type_name: &'static str,
        path: String,
    },
}

/// Result type alias for muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
