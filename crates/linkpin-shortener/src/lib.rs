//! Composes the allocator, codec and mapping store into the shorten and
//! redirect operations.

pub mod error;
pub mod service;
pub mod shortener;
mod validate;

pub use error::ShortenerError;
pub use service::{Deadlines, ShortenerService};
pub use shortener::{ComponentStatus, HealthReport, ShortenStage, Shortened, Shortener};
pub use validate::validate_url;
