use async_trait::async_trait;
use linkpin_core::{Allocator, AllocatorError};
use tracing::{debug, trace, warn};

use crate::counter::{self, CounterSettings};
use crate::error::{map_pool_error, Result};

/// An allocator backed by a single Redis node.
///
/// Suitable when Redis availability is handled outside the application
/// (a managed endpoint, a proxy). For Sentinel deployments use
/// [`SentinelAllocator`](crate::SentinelAllocator).
#[derive(Clone)]
pub struct RedisAllocator {
    pool: deadpool_redis::Pool,
    counter: CounterSettings,
}

impl std::fmt::Debug for RedisAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisAllocator")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl RedisAllocator {
    /// Connects to `url` (e.g. `redis://:secret@localhost:6379`) and seeds the
    /// counter if it does not exist yet.
    pub async fn connect(url: &str, counter: CounterSettings) -> Result<Self> {
        let pool = deadpool_redis::Config::from_url(url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| AllocatorError::Initialization(format!("failed to create pool: {e}")))?;

        let allocator = Self { pool, counter };
        let mut conn = allocator.connection().await?;
        counter::seed(&mut conn, &allocator.counter).await?;
        Ok(allocator)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| map_pool_error("failed to get connection", e))
    }
}

#[async_trait]
impl Allocator for RedisAllocator {
    async fn next(&self) -> Result<u64> {
        let mut conn = self.connection().await.inspect_err(|e| {
            warn!(error = %e, "Failed to get connection from pool");
        })?;

        let value = counter::increment(&mut conn, &self.counter).await?;
        trace!(key = %self.counter.key, value, "incremented sequence counter");
        Ok(value)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        counter::ping(&mut conn).await?;
        debug!("redis allocator reachable");
        Ok(())
    }
}
