use std::result::Result as StdResult;
use thiserror::Error;

use crate::redis::ConfigError;

/// Errors that can occur when working with test infrastructure containers.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("Container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// A type alias for `Result` with `TestInfraError`.
pub type Result<T> = StdResult<T, TestInfraError>;
