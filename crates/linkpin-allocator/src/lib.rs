//! Sequence allocators backing short code issuance.
//!
//! Every allocator hands out strictly increasing `u64` values through
//! [`linkpin_core::Allocator`]. The Redis-backed variants hold the counter in
//! a single key and rely on `INCR` being atomic on the server; the client
//! never performs a read-modify-write.

pub mod counter;
pub mod error;
pub mod memory;
pub mod redis;
pub mod sentinel;

pub use counter::{CounterSettings, DEFAULT_COUNTER_KEY, DEFAULT_INITIAL_VALUE};
pub use memory::InMemoryAllocator;
pub use self::redis::RedisAllocator;
pub use sentinel::{PrimaryAddr, SentinelAllocator, SentinelSettings};
