//! Disposable containers for integration tests.
//!
//! Everything here needs a reachable Docker daemon. The Redis HA topology
//! talks to containers over their bridge addresses, which are only routable
//! from the host on Linux.

pub mod cassandra;
pub mod error;
pub mod mysql;
pub mod redis;

pub use error::{Result, TestInfraError};
