//! Cache operation errors.

/// Errors from cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A value could not be serialized into the store.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A cached value could not be deserialized into the requested type.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
