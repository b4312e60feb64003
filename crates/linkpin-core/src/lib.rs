//! Core types and traits for the linkpin URL shortener.
//!
//! This crate provides the shared vocabulary used by the allocator,
//! storage, shortener and gateway crates: short codes, stored mappings,
//! and the two narrow capabilities the orchestrator is built on.

pub mod allocator;
pub mod error;
pub mod mapping;
pub mod shortcode;
pub mod store;

pub use allocator::Allocator;
pub use error::{AllocatorError, CoreError, StorageError};
pub use mapping::UrlMapping;
pub use shortcode::ShortCode;
pub use store::MappingStore;
