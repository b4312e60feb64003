mod config;
mod ha;
mod master;
mod replica;
mod sentinel;

pub use config::{ConfigError, RedisHAConfig};
pub use ha::RedisHA;
pub use master::RedisMaster;
pub use replica::RedisReplica;
pub use sentinel::RedisSentinel;

pub(crate) const REDIS_IMAGE: &str = "redis";
pub(crate) const REDIS_TAG: &str = "7.4";
pub(crate) const REDIS_PORT: u16 = 6379;
pub(crate) const SENTINEL_PORT: u16 = 26379;
