use deadpool_redis::redis::RedisError;
use linkpin_core::AllocatorError;

pub type Result<T> = std::result::Result<T, AllocatorError>;

/// Classifies a command error from a pooled connection.
///
/// A `READONLY` reply means we are talking to a demoted primary, which is a
/// topology problem rather than a command problem.
pub(crate) fn map_redis_error(operation: &str, err: RedisError) -> AllocatorError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        AllocatorError::Timeout(message)
    } else if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || message.contains("READONLY")
    {
        AllocatorError::Unavailable(message)
    } else {
        AllocatorError::Operation(message)
    }
}

pub(crate) fn map_pool_error(operation: &str, err: impl std::fmt::Display) -> AllocatorError {
    let message = format!("{operation}: {err}");
    if message.to_ascii_lowercase().contains("timed out") {
        AllocatorError::Timeout(message)
    } else {
        AllocatorError::Unavailable(message)
    }
}
