use std::collections::HashSet;
use std::sync::Arc;

use linkpin_allocator::{CounterSettings, RedisAllocator, DEFAULT_INITIAL_VALUE};
use linkpin_core::Allocator;
use linkpin_test_infra::redis::RedisMaster;

struct Fixture {
    redis: RedisMaster,
    url: String,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisMaster::new().await.expect("start redis");
        let url = redis.url().await.expect("redis url");
        Self { redis, url }
    }

    async fn allocator(&self) -> RedisAllocator {
        RedisAllocator::connect(&self.url, CounterSettings::default())
            .await
            .expect("connect allocator")
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn first_value_follows_the_seed() {
    let fixture = Fixture::start().await;
    let allocator = fixture.allocator().await;

    assert_eq!(allocator.next().await.unwrap(), DEFAULT_INITIAL_VALUE + 1);
    assert_eq!(allocator.next().await.unwrap(), DEFAULT_INITIAL_VALUE + 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn reconnecting_does_not_reset_the_counter() {
    let fixture = Fixture::start().await;

    let first = fixture.allocator().await;
    for _ in 0..10 {
        first.next().await.unwrap();
    }
    drop(first);

    let second = fixture.allocator().await;
    assert_eq!(second.next().await.unwrap(), DEFAULT_INITIAL_VALUE + 11);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_instances_never_share_a_value() {
    let fixture = Fixture::start().await;
    let instances = [
        Arc::new(fixture.allocator().await),
        Arc::new(fixture.allocator().await),
        Arc::new(fixture.allocator().await),
    ];

    let mut tasks = Vec::new();
    for i in 0..24 {
        let allocator = Arc::clone(&instances[i % instances.len()]);
        tasks.push(tokio::spawn(async move {
            let mut values = Vec::with_capacity(100);
            for _ in 0..100 {
                values.push(allocator.next().await.unwrap());
            }
            values
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for value in task.await.unwrap() {
            assert!(seen.insert(value), "value {value} issued twice");
        }
    }
    assert_eq!(seen.len(), 2400);
    assert_eq!(seen.iter().max().copied(), Some(DEFAULT_INITIAL_VALUE + 2400));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn reports_unavailable_once_the_node_is_gone() {
    let fixture = Fixture::start().await;
    let allocator = fixture.allocator().await;
    allocator.ping().await.unwrap();

    fixture.redis.stop().await.expect("stop redis");

    let err = allocator.next().await.unwrap_err();
    assert!(err.is_retriable(), "unexpected error: {err}");
    assert!(allocator.ping().await.is_err());
}
