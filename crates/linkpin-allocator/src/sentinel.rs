//! Allocator that follows a Redis Sentinel deployment across failovers.
//!
//! A background task (the topology watcher) asks the sentinels which node is
//! the current primary for a service name, confirms the answer with `ROLE`,
//! and publishes the result through a [`watch`] channel. Request tasks only
//! ever read the latest published primary, so a slow or stuck sentinel never
//! blocks an allocation. When an allocation fails at the connection level the
//! watcher is woken for an immediate re-probe.
//!
//! Election itself is the sentinels' job: a replica is only promoted once a
//! quorum of sentinels agrees the primary is down.

use async_trait::async_trait;
use linkpin_core::{Allocator, AllocatorError};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

use crate::counter::{self, CounterSettings};
use crate::error::{map_pool_error, Result};

/// Configuration for a [`SentinelAllocator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct SentinelSettings {
    /// Sentinel addresses, e.g. `redis://localhost:26379`.
    pub sentinels: Vec<String>,
    /// The service name the sentinels monitor (e.g. "mymaster").
    #[builder(setter(into))]
    pub service_name: String,
    /// Password for the data nodes. Sentinel credentials go in their URLs.
    #[builder(default, setter(into))]
    pub password: Option<String>,
    #[builder(default = Duration::from_secs(1))]
    pub poll_interval: Duration,
    /// Upper bound for a single sentinel query or role check.
    #[builder(default = Duration::from_secs(2))]
    pub probe_timeout: Duration,
}

/// Network address of a Redis primary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryAddr {
    pub host: String,
    pub port: u16,
}

impl PrimaryAddr {
    fn url(&self, password: Option<&str>) -> String {
        match password {
            Some(password) => format!("redis://:{password}@{}:{}", self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl Display for PrimaryAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

struct Primary {
    addr: PrimaryAddr,
    pool: deadpool_redis::Pool,
}

type Topology = Option<Arc<Primary>>;

/// An allocator whose counter lives on the current Sentinel-elected primary.
pub struct SentinelAllocator {
    service_name: String,
    topology: watch::Receiver<Topology>,
    refresh: Arc<Notify>,
    counter: CounterSettings,
    watcher: JoinHandle<()>,
}

impl std::fmt::Debug for SentinelAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentinelAllocator")
            .field("service_name", &self.service_name)
            .field("primary", &self.primary())
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl SentinelAllocator {
    /// Resolves the current primary, seeds the counter, and starts the
    /// topology watcher.
    ///
    /// Fails if no sentinel can name a reachable primary.
    pub async fn connect(settings: SentinelSettings, counter: CounterSettings) -> Result<Self> {
        if settings.sentinels.is_empty() {
            return Err(AllocatorError::Initialization(
                "at least one sentinel address is required".to_string(),
            ));
        }

        let sentinels = settings
            .sentinels
            .iter()
            .map(|url| {
                ::redis::Client::open(url.as_str()).map_err(|e| {
                    AllocatorError::Initialization(format!("invalid sentinel address '{url}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (tx, rx) = watch::channel(None);
        let refresh = Arc::new(Notify::new());

        let mut watcher = TopologyWatcher {
            sentinels,
            service_name: settings.service_name.clone(),
            password: settings.password,
            poll_interval: settings.poll_interval,
            probe_timeout: settings.probe_timeout,
            refresh: Arc::clone(&refresh),
            tx,
        };

        watcher.refresh().await?;

        let primary = rx.borrow().clone().ok_or_else(|| {
            AllocatorError::Unavailable(format!(
                "no primary known for '{}'",
                settings.service_name
            ))
        })?;
        let mut conn = primary
            .pool
            .get()
            .await
            .map_err(|e| map_pool_error("failed to get primary connection", e))?;
        counter::seed(&mut conn, &counter).await?;
        drop(conn);

        info!(
            service_name = %settings.service_name,
            primary = %primary.addr,
            "connected sequence allocator through sentinels"
        );

        Ok(Self {
            service_name: settings.service_name,
            topology: rx,
            refresh,
            counter,
            watcher: tokio::spawn(watcher.run()),
        })
    }

    /// The primary that allocations are currently sent to.
    pub fn primary(&self) -> Option<PrimaryAddr> {
        self.topology
            .borrow()
            .as_ref()
            .map(|primary| primary.addr.clone())
    }

    fn current(&self) -> Result<Arc<Primary>> {
        let current = self.topology.borrow().clone();
        match current {
            Some(primary) => Ok(primary),
            None => {
                self.refresh.notify_one();
                Err(AllocatorError::Unavailable(format!(
                    "no primary elected for '{}'",
                    self.service_name
                )))
            }
        }
    }

    async fn on_primary<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(deadpool_redis::Connection) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let primary = self.current()?;
        let result = match primary.pool.get().await {
            Ok(conn) => op(conn).await,
            Err(e) => Err(map_pool_error("failed to get primary connection", e)),
        };

        if let Err(e) = &result {
            if e.is_retriable() {
                warn!(primary = %primary.addr, error = %e, "primary call failed, requesting topology refresh");
                self.refresh.notify_one();
            }
        }
        result
    }
}

impl Drop for SentinelAllocator {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl Allocator for SentinelAllocator {
    async fn next(&self) -> Result<u64> {
        let value = self
            .on_primary(|mut conn| async move {
                counter::increment(&mut conn, &self.counter).await
            })
            .await?;
        trace!(key = %self.counter.key, value, "incremented sequence counter");
        Ok(value)
    }

    async fn ping(&self) -> Result<()> {
        self.on_primary(|mut conn| async move { counter::ping(&mut conn).await })
            .await
    }
}

enum Discovery {
    Found(PrimaryAddr),
    /// Sentinels answered, but none named a node that reports the master role.
    NoPrimary,
    /// No sentinel answered at all.
    SentinelsUnreachable,
}

struct TopologyWatcher {
    sentinels: Vec<::redis::Client>,
    service_name: String,
    password: Option<String>,
    poll_interval: Duration,
    probe_timeout: Duration,
    refresh: Arc<Notify>,
    tx: watch::Sender<Topology>,
}

impl TopologyWatcher {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.refresh.notified() => {
                    debug!(service_name = %self.service_name, "topology refresh requested");
                }
            }

            if let Err(e) = self.refresh().await {
                warn!(service_name = %self.service_name, error = %e, "topology refresh failed");
            }
        }
    }

    async fn refresh(&mut self) -> Result<()> {
        match self.discover().await {
            Discovery::Found(addr) => {
                let previous = self.tx.borrow().as_ref().map(|p| p.addr.clone());
                if previous.as_ref() == Some(&addr) {
                    return Ok(());
                }

                let pool = deadpool_redis::Config::from_url(addr.url(self.password.as_deref()))
                    .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                    .map_err(|e| {
                        AllocatorError::Initialization(format!(
                            "failed to create pool for {addr}: {e}"
                        ))
                    })?;

                match previous {
                    Some(previous) => {
                        info!(%previous, current = %addr, "sequence allocator primary changed")
                    }
                    None => info!(current = %addr, "sequence allocator primary resolved"),
                }
                self.tx.send_replace(Some(Arc::new(Primary { addr, pool })));
                Ok(())
            }
            Discovery::NoPrimary => {
                if self.tx.borrow().is_some() {
                    warn!(service_name = %self.service_name, "primary lost, failing allocations until a new one is elected");
                }
                self.tx.send_replace(None);
                Err(AllocatorError::Unavailable(format!(
                    "no primary elected for '{}'",
                    self.service_name
                )))
            }
            // the last known primary may still be healthy, keep using it
            Discovery::SentinelsUnreachable => Err(AllocatorError::Unavailable(
                "no sentinel reachable".to_string(),
            )),
        }
    }

    async fn discover(&self) -> Discovery {
        let mut answered = false;

        for sentinel in &self.sentinels {
            let addr = match timeout(
                self.probe_timeout,
                query_primary(sentinel, &self.service_name),
            )
            .await
            {
                Ok(Ok(Some(addr))) => addr,
                Ok(Ok(None)) => {
                    answered = true;
                    debug!(service_name = %self.service_name, "sentinel does not know the service");
                    continue;
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "sentinel query failed");
                    continue;
                }
                Err(_) => {
                    debug!("sentinel query timed out");
                    continue;
                }
            };
            answered = true;

            match timeout(
                self.probe_timeout,
                reports_master_role(&addr, self.password.as_deref()),
            )
            .await
            {
                Ok(Ok(true)) => return Discovery::Found(addr),
                Ok(Ok(false)) => debug!(%addr, "reported primary is not in master role"),
                Ok(Err(e)) => debug!(%addr, error = %e, "reported primary unreachable"),
                Err(_) => debug!(%addr, "role check timed out"),
            }
        }

        if answered {
            Discovery::NoPrimary
        } else {
            Discovery::SentinelsUnreachable
        }
    }
}

async fn query_primary(
    sentinel: &::redis::Client,
    service_name: &str,
) -> ::redis::RedisResult<Option<PrimaryAddr>> {
    let mut conn = sentinel.get_multiplexed_async_connection().await?;
    let reply: Option<(String, u16)> = ::redis::cmd("SENTINEL")
        .arg("get-master-addr-by-name")
        .arg(service_name)
        .query_async(&mut conn)
        .await?;
    Ok(reply.map(|(host, port)| PrimaryAddr { host, port }))
}

async fn reports_master_role(
    addr: &PrimaryAddr,
    password: Option<&str>,
) -> ::redis::RedisResult<bool> {
    let client = ::redis::Client::open(addr.url(password))?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let role: Vec<::redis::Value> = ::redis::cmd("ROLE").query_async(&mut conn).await?;
    Ok(match role.first() {
        Some(::redis::Value::BulkString(bytes)) => bytes.as_slice() == b"master",
        Some(::redis::Value::SimpleString(s)) => s == "master",
        _ => false,
    })
}
