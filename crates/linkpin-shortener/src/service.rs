use async_trait::async_trait;
use jiff::Timestamp;
use linkpin_codec::Codec;
use linkpin_core::{Allocator, AllocatorError, MappingStore, ShortCode, StorageError, UrlMapping};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

use crate::error::{Result, ShortenerError};
use crate::shortener::{ComponentStatus, HealthReport, ShortenStage, Shortened, Shortener};
use crate::validate::validate_url;

/// Upper bounds for each network call. Expiry counts as a failure of that
/// call.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct Deadlines {
    #[builder(default = Duration::from_secs(2))]
    pub allocator: Duration,
    #[builder(default = Duration::from_secs(2))]
    pub store: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The resolution orchestrator.
///
/// Uniqueness of short codes comes entirely from the allocator: the codec
/// is a bijection, so distinct counter values never collide and no store
/// lookup is made before writing. A failed write abandons its counter
/// value for good.
pub struct ShortenerService<A: ?Sized, S: ?Sized> {
    allocator: Arc<A>,
    store: Arc<S>,
    codec: Arc<Codec>,
    base_url: String,
    deadlines: Deadlines,
}

impl<A: ?Sized, S: ?Sized> Clone for ShortenerService<A, S> {
    fn clone(&self) -> Self {
        Self {
            allocator: Arc::clone(&self.allocator),
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
            base_url: self.base_url.clone(),
            deadlines: self.deadlines,
        }
    }
}

impl<A: ?Sized, S: ?Sized> std::fmt::Debug for ShortenerService<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerService")
            .field("codec", &self.codec)
            .field("base_url", &self.base_url)
            .field("deadlines", &self.deadlines)
            .finish_non_exhaustive()
    }
}

impl<A, S> ShortenerService<A, S>
where
    A: Allocator + ?Sized,
    S: MappingStore + ?Sized,
{
    pub fn new(
        allocator: Arc<A>,
        store: Arc<S>,
        codec: Codec,
        base_url: impl Into<String>,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            allocator,
            store,
            codec: Arc::new(codec),
            base_url: base_url.into(),
            deadlines,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn next_value(&self) -> Result<u64> {
        match timeout(self.deadlines.allocator, self.allocator.next()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ShortenerError::AllocatorUnavailable(e)),
            Err(_) => Err(ShortenerError::AllocatorUnavailable(AllocatorError::Timeout(
                format!("no counter value within {:?}", self.deadlines.allocator),
            ))),
        }
    }

    async fn store_mapping(&self, mapping: &UrlMapping) -> Result<()> {
        match timeout(self.deadlines.store, self.store.put(mapping)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShortenerError::StoreUnavailable(e)),
            // the write may still land; it is reported as failed either way
            Err(_) => Err(ShortenerError::StoreUnavailable(StorageError::Timeout(
                format!("write not acknowledged within {:?}", self.deadlines.store),
            ))),
        }
    }
}

#[async_trait]
impl<A, S> Shortener for ShortenerService<A, S>
where
    A: Allocator + ?Sized,
    S: MappingStore + ?Sized,
{
    async fn shorten(&self, original_url: &str) -> Result<Shortened> {
        validate_url(original_url)?;
        trace!(stage = %ShortenStage::Received, "shorten request accepted");

        let value = self.next_value().await.inspect_err(|e| {
            warn!(error = %e, "failed to draw counter value");
        })?;
        trace!(stage = %ShortenStage::CounterIssued, value, "counter value issued");

        let code = ShortCode::parse(self.codec.encode(value)).map_err(|e| {
            ShortenerError::Internal(format!("codec produced an unusable code: {e}"))
        })?;
        trace!(stage = %ShortenStage::CodeEncoded, value, code = %code, "code encoded");

        let mapping = UrlMapping::new(code.clone(), original_url, Timestamp::now());
        if let Err(e) = self.store_mapping(&mapping).await {
            warn!(
                stage = %ShortenStage::StoreFailed,
                orphaned_value = value,
                code = %code,
                error = %e,
                "failed to store mapping, counter value abandoned"
            );
            return Err(e);
        }

        debug!(stage = %ShortenStage::Stored, code = %code, "mapping stored");
        Ok(Shortened {
            short_url: code.to_url(&self.base_url),
            code,
        })
    }

    async fn redirect(&self, code: &str) -> Result<Option<UrlMapping>> {
        let Ok(code) = ShortCode::parse(code) else {
            debug!(code, "rejecting malformed short code");
            return Ok(None);
        };

        match timeout(self.deadlines.store, self.store.get(&code)).await {
            Ok(Ok(found)) => {
                trace!(code = %code, hit = found.is_some(), "short code looked up");
                Ok(found)
            }
            Ok(Err(e)) => {
                warn!(code = %code, error = %e, "failed to look up short code");
                Err(ShortenerError::StoreUnavailable(e))
            }
            Err(_) => {
                warn!(code = %code, "short code lookup timed out");
                Err(ShortenerError::StoreUnavailable(StorageError::Timeout(
                    format!("lookup not answered within {:?}", self.deadlines.store),
                )))
            }
        }
    }

    async fn health(&self) -> HealthReport {
        let (allocator, store) = tokio::join!(
            probe(self.deadlines.allocator, self.allocator.ping()),
            probe(self.deadlines.store, self.store.ping()),
        );

        let report = HealthReport { allocator, store };
        if !report.is_healthy() {
            info!(allocator = ?report.allocator, store = ?report.store, "health check failed");
        }
        report
    }
}

async fn probe<E: Display>(
    deadline: Duration,
    check: impl Future<Output = std::result::Result<(), E>>,
) -> ComponentStatus {
    match timeout(deadline, check).await {
        Ok(Ok(())) => ComponentStatus::Up,
        Ok(Err(e)) => ComponentStatus::Down(e.to_string()),
        Err(_) => ComponentStatus::Down(format!("no answer within {deadline:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkpin_allocator::InMemoryAllocator;
    use linkpin_codec::CodecSettings;
    use linkpin_storage::InMemoryRepository;
    use std::collections::HashSet;

    const BASE_URL: &str = "https://lnk.pin";
    const SALT: &str = "linkpin-test-salt";

    struct Fixture {
        allocator: Arc<InMemoryAllocator>,
        store: Arc<InMemoryRepository>,
        service: ShortenerService<InMemoryAllocator, InMemoryRepository>,
    }

    fn codec() -> Codec {
        Codec::new(CodecSettings::builder().salt(SALT).build()).unwrap()
    }

    fn fixture() -> Fixture {
        let allocator = Arc::new(InMemoryAllocator::with_initial(14_000_000));
        let store = Arc::new(InMemoryRepository::new());
        let service = ShortenerService::new(
            Arc::clone(&allocator),
            Arc::clone(&store),
            codec(),
            BASE_URL,
            Deadlines::default(),
        );
        Fixture {
            allocator,
            store,
            service,
        }
    }

    /// A store whose every call outlives any reasonable deadline.
    struct StalledStore;

    #[async_trait]
    impl MappingStore for StalledStore {
        async fn put(&self, _: &UrlMapping) -> linkpin_core::store::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn get(&self, _: &ShortCode) -> linkpin_core::store::Result<Option<UrlMapping>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn ping(&self) -> linkpin_core::store::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn shorten_then_redirect_returns_original_url() {
        let f = fixture();

        let shortened = f.service.shorten("https://example.com/a").await.unwrap();
        assert_eq!(shortened.code.as_str(), "wz2Xe0");
        assert_eq!(shortened.short_url, "https://lnk.pin/wz2Xe0");

        let mapping = f
            .service
            .redirect(shortened.code.as_str())
            .await
            .unwrap()
            .expect("mapping stored");
        assert_eq!(mapping.original_url, "https://example.com/a");
        assert_eq!(mapping.short_code, shortened.code);
    }

    #[tokio::test]
    async fn code_decodes_to_the_issued_counter_value() {
        let f = fixture();

        let shortened = f.service.shorten("https://example.com").await.unwrap();
        assert_eq!(codec().decode(shortened.code.as_str()), Ok(f.allocator.current()));
    }

    #[tokio::test]
    async fn same_url_twice_gets_distinct_codes() {
        let f = fixture();

        let first = f.service.shorten("https://example.com").await.unwrap();
        let second = f.service.shorten("https://example.com").await.unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_not_doubled() {
        let service = ShortenerService::new(
            Arc::new(InMemoryAllocator::with_initial(14_000_000)),
            Arc::new(InMemoryRepository::new()),
            codec(),
            "https://lnk.pin/",
            Deadlines::default(),
        );

        let shortened = service.shorten("https://example.com").await.unwrap();
        assert_eq!(shortened.short_url, "https://lnk.pin/wz2Xe0");
    }

    #[tokio::test]
    async fn invalid_url_does_not_consume_a_counter_value() {
        let f = fixture();

        let err = f.service.shorten("ftp://example.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(!err.is_retriable());
        assert_eq!(f.allocator.current(), 14_000_000);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn store_failure_abandons_the_counter_value() {
        let f = fixture();

        f.store.set_available(false);
        let err = f.service.shorten("https://example.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::StoreUnavailable(_)));
        assert!(err.is_retriable());
        assert_eq!(f.allocator.current(), 14_000_001);

        f.store.set_available(true);
        let retried = f.service.shorten("https://example.com").await.unwrap();
        assert_eq!(codec().decode(retried.code.as_str()), Ok(14_000_002));
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn allocator_failure_leaves_the_store_untouched() {
        let f = fixture();

        f.allocator.set_available(false);
        let err = f.service.shorten("https://example.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::AllocatorUnavailable(_)));
        assert!(err.is_retriable());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn unknown_code_resolves_to_none() {
        let f = fixture();
        assert_eq!(f.service.redirect("zzzzzzz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_code_resolves_to_none_without_a_lookup() {
        let f = fixture();
        f.store.set_available(false);

        assert_eq!(f.service.redirect("not-a-code").await.unwrap(), None);
        assert_eq!(f.service.redirect("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn redirect_surfaces_store_outage() {
        let f = fixture();
        f.store.set_available(false);

        let err = f.service.redirect("wz2Xe0").await.unwrap_err();
        assert!(matches!(err, ShortenerError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn slow_store_write_counts_as_failure() {
        let allocator = Arc::new(InMemoryAllocator::new());
        let service = ShortenerService::new(
            Arc::clone(&allocator),
            Arc::new(StalledStore),
            codec(),
            BASE_URL,
            Deadlines::builder().store(Duration::from_millis(50)).build(),
        );

        let err = service.shorten("https://example.com").await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::StoreUnavailable(StorageError::Timeout(_))
        ));
        assert_eq!(allocator.current(), 1);

        let report = service.health().await;
        assert!(report.allocator.is_up());
        assert!(!report.store.is_up());
    }

    #[tokio::test]
    async fn health_reports_each_component() {
        let f = fixture();

        for _ in 0..3 {
            assert!(f.service.health().await.is_healthy());
        }

        f.store.set_available(false);
        let report = f.service.health().await;
        assert!(!report.is_healthy());
        assert!(report.allocator.is_up());
        assert!(matches!(report.store, ComponentStatus::Down(_)));

        f.store.set_available(true);
        f.allocator.set_available(false);
        let report = f.service.health().await;
        assert!(!report.allocator.is_up());
        assert!(report.store.is_up());
    }

    #[tokio::test]
    async fn works_behind_trait_objects() {
        let allocator: Arc<dyn Allocator> = Arc::new(InMemoryAllocator::new());
        let store: Arc<dyn MappingStore> = Arc::new(InMemoryRepository::new());
        let service: Arc<dyn Shortener> = Arc::new(ShortenerService::new(
            allocator,
            store,
            codec(),
            BASE_URL,
            Deadlines::default(),
        ));

        let shortened = service.shorten("http://localhost:8080/x").await.unwrap();
        let found = service.redirect(shortened.code.as_str()).await.unwrap();
        assert_eq!(found.map(|m| m.original_url), Some("http://localhost:8080/x".to_string()));
    }

    #[tokio::test]
    async fn concurrent_shortens_produce_unique_codes() {
        let f = fixture();

        let mut tasks = Vec::new();
        for task in 0..16 {
            let service = f.service.clone();
            tasks.push(tokio::spawn(async move {
                let mut codes = Vec::new();
                for i in 0..50 {
                    let url = format!("https://example.com/{task}/{i}");
                    codes.push(service.shorten(&url).await.unwrap().code);
                }
                codes
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            for code in task.await.unwrap() {
                assert!(seen.insert(code.clone()), "duplicate code {code}");
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(f.store.len(), 800);
    }
}
