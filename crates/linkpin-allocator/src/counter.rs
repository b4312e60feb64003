use crate::error::{map_redis_error, Result};
use deadpool_redis::redis::{self, AsyncCommands};
use linkpin_core::AllocatorError;
use std::time::Duration;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_COUNTER_KEY: &str = "counter";

/// Starting point for a fresh counter. Values below this would produce
/// codes of very uneven length early in a deployment's life.
pub const DEFAULT_INITIAL_VALUE: u64 = 14_000_000;

/// How the shared counter is addressed and incremented.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CounterSettings {
    #[builder(default = DEFAULT_COUNTER_KEY.to_string(), setter(into))]
    pub key: String,
    #[builder(default = DEFAULT_INITIAL_VALUE)]
    pub initial_value: u64,
    /// Replicas that must acknowledge an increment before its value is
    /// handed out. Zero disables the check.
    #[builder(default = 0)]
    pub min_replica_acks: u32,
    #[builder(default = Duration::from_millis(200))]
    pub replica_ack_timeout: Duration,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Seeds the counter with `SET key initial NX`.
///
/// An existing counter is never touched. Returns whether the seed was written.
pub(crate) async fn seed(
    conn: &mut deadpool_redis::Connection,
    settings: &CounterSettings,
) -> Result<bool> {
    let reply: Option<String> = redis::cmd("SET")
        .arg(&settings.key)
        .arg(settings.initial_value)
        .arg("NX")
        .query_async(conn)
        .await
        .map_err(|e| map_redis_error("failed to seed counter", e))?;

    let seeded = reply.is_some();
    if seeded {
        info!(key = %settings.key, initial_value = settings.initial_value, "seeded sequence counter");
    } else {
        debug!(key = %settings.key, "sequence counter already exists");
    }
    Ok(seeded)
}

/// Atomically increments the counter and returns the new value.
pub(crate) async fn increment(
    conn: &mut deadpool_redis::Connection,
    settings: &CounterSettings,
) -> Result<u64> {
    if settings.min_replica_acks == 0 {
        return conn
            .incr::<_, _, u64>(&settings.key, 1)
            .await
            .map_err(|e| map_redis_error("failed to increment counter", e));
    }

    let (value, acked): (u64, u32) = redis::pipe()
        .cmd("INCR")
        .arg(&settings.key)
        .cmd("WAIT")
        .arg(settings.min_replica_acks)
        .arg(settings.replica_ack_timeout.as_millis() as u64)
        .query_async(conn)
        .await
        .map_err(|e| map_redis_error("failed to increment counter", e))?;

    if acked < settings.min_replica_acks {
        // the value may not survive a failover, so it is never handed out
        warn!(
            value,
            acked,
            required = settings.min_replica_acks,
            "abandoning counter value without enough replica acknowledgements"
        );
        return Err(AllocatorError::Unavailable(format!(
            "counter value acknowledged by {acked} of {} replicas",
            settings.min_replica_acks
        )));
    }

    Ok(value)
}

pub(crate) async fn ping(conn: &mut deadpool_redis::Connection) -> Result<()> {
    let _: String = redis::cmd("PING")
        .query_async(conn)
        .await
        .map_err(|e| map_redis_error("failed to ping", e))?;
    Ok(())
}
