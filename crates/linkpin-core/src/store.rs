use crate::error::StorageError;
use crate::mapping::UrlMapping;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// The durable system of record for short code mappings.
#[async_trait]
pub trait MappingStore: Send + Sync + 'static {
    /// Writes a mapping. Codes are unique by construction, so implementations
    /// are not required to guard against overwrites.
    async fn put(&self, mapping: &UrlMapping) -> Result<()>;

    /// Retrieves the mapping for a given short code.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlMapping>>;

    /// Checks that at least one store node is reachable.
    async fn ping(&self) -> Result<()>;
}
