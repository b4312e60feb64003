//! Mapping store implementations.
//!
//! [`CassandraRepository`] is the system of record in production. The MySQL
//! backend covers deployments without a Cassandra cluster, and the in-memory
//! repository backs tests and local development.

pub mod cassandra;
pub mod memory;
pub mod mysql;

pub use cassandra::{CassandraRepository, CassandraSettings, ConsistencyLevel};
pub use linkpin_core::store::{MappingStore, Result};
pub use linkpin_core::StorageError;
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
