use linkpin_core::{AllocatorError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Error)]
pub enum ShortenerError {
    /// The submitted URL is malformed. Not retriable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No counter value could be drawn.
    #[error("Allocator unavailable: {0}")]
    AllocatorUnavailable(#[source] AllocatorError),

    /// The mapping could not be written or read.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShortenerError {
    /// Whether the caller may retry the whole operation.
    ///
    /// A retried shorten draws a fresh counter value.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::AllocatorUnavailable(e) => e.is_retriable(),
            Self::StoreUnavailable(e) => e.is_retriable(),
            Self::InvalidUrl(_) | Self::Internal(_) => false,
        }
    }
}
