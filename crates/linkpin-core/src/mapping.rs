use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored short code to URL mapping.
///
/// One mapping is written per successful shorten call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlMapping {
    /// The primary key.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// When the mapping was created.
    pub created_at: Timestamp,
}

impl UrlMapping {
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
            created_at,
        }
    }
}
