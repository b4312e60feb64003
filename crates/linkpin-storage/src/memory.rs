use async_trait::async_trait;
use dashmap::DashMap;
use linkpin_core::store::Result;
use linkpin_core::{MappingStore, ShortCode, StorageError, UrlMapping};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory mapping store backed by a concurrent hash map.
///
/// Availability can be toggled to simulate a store outage.
#[derive(Debug)]
pub struct InMemoryRepository {
    mappings: DashMap<ShortCode, UrlMapping>,
    available: AtomicBool,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            mappings: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "in-memory store is switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl MappingStore for InMemoryRepository {
    async fn put(&self, mapping: &UrlMapping) -> Result<()> {
        self.ensure_available()?;
        self.mappings
            .insert(mapping.short_code.clone(), mapping.clone());
        Ok(())
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        self.ensure_available()?;
        Ok(self.mappings.get(code).map(|entry| entry.value().clone()))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
