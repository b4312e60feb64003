use crate::error::AllocatorError;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, AllocatorError>;

/// A source of globally unique, monotonically increasing integers.
///
/// Two calls to [`Allocator::next`], from any number of tasks or processes
/// sharing the same backend, never observe the same value. Gaps are allowed.
/// Implementations must not retry the increment internally: a failed call is
/// reported to the caller, who draws a fresh value on retry.
#[async_trait]
pub trait Allocator: Send + Sync + 'static {
    /// Atomically increments the counter and returns the new value.
    async fn next(&self) -> Result<u64>;

    /// Checks connectivity to the current counter owner.
    async fn ping(&self) -> Result<()>;
}
