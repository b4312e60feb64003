use async_trait::async_trait;
use linkpin_core::{ShortCode, UrlMapping};
use std::fmt::{Display, Formatter};

use crate::error::Result;

/// Progress of a single shorten request.
///
/// A request only moves forward. A retry starts again at `Received` and
/// never reuses the counter value of an earlier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortenStage {
    Received,
    CounterIssued,
    CodeEncoded,
    /// Terminal success.
    Stored,
    /// Terminal failure. The issued counter value is abandoned.
    StoreFailed,
}

impl ShortenStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::CounterIssued => "counter_issued",
            Self::CodeEncoded => "code_encoded",
            Self::Stored => "stored",
            Self::StoreFailed => "store_failed",
        }
    }
}

impl Display for ShortenStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful shorten call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub code: ShortCode,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStatus {
    Up,
    Down(String),
}

impl ComponentStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Reachability of both dependencies, probed concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub allocator: ComponentStatus,
    pub store: ComponentStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.allocator.is_up() && self.store.is_up()
    }
}

/// Shorten and resolve URLs.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Issues a new short code for `original_url` and stores the mapping.
    async fn shorten(&self, original_url: &str) -> Result<Shortened>;

    /// Looks up a short code.
    ///
    /// Unknown and malformed codes both resolve to `Ok(None)`.
    async fn redirect(&self, code: &str) -> Result<Option<UrlMapping>>;

    async fn health(&self) -> HealthReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_requires_both_components() {
        let up = HealthReport {
            allocator: ComponentStatus::Up,
            store: ComponentStatus::Up,
        };
        assert!(up.is_healthy());

        let store_down = HealthReport {
            allocator: ComponentStatus::Up,
            store: ComponentStatus::Down("no nodes".into()),
        };
        assert!(!store_down.is_healthy());
    }

    #[test]
    fn stage_names() {
        assert_eq!(ShortenStage::CounterIssued.to_string(), "counter_issued");
        assert_eq!(ShortenStage::StoreFailed.as_str(), "store_failed");
    }
}
