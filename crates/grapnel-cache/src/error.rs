//! Error types for the cache layer.

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Value at {key} is not an integer")]
    NotAnInteger { key: String },

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
