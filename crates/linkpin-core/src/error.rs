use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors surfaced by a sequence allocator.
#[derive(Debug, Clone, Error)]
pub enum AllocatorError {
    #[error("allocator unavailable: {0}")]
    Unavailable(String),
    #[error("allocator operation timed out: {0}")]
    Timeout(String),
    #[error("allocator returned invalid data: {0}")]
    InvalidData(String),
    #[error("allocator initialization failed: {0}")]
    Initialization(String),
    #[error("allocator operation failed: {0}")]
    Operation(String),
}

impl AllocatorError {
    /// Whether a caller may retry with a fresh `next()` call.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Errors surfaced by a mapping store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage initialization failed: {0}")]
    Initialization(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
