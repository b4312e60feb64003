use std::net::IpAddr;

use crate::redis::{RedisHAConfig, RedisMaster, RedisReplica, RedisSentinel};
use crate::Result;

/// A primary, its replicas, and the sentinels monitoring them.
pub struct RedisHA {
    config: RedisHAConfig,
    master: RedisMaster,
    replicas: Vec<RedisReplica>,
    sentinels: Vec<RedisSentinel>,
}

impl RedisHA {
    pub async fn new(config: RedisHAConfig) -> Result<Self> {
        config.validate()?;

        let master = RedisMaster::new().await?;
        let master_ip = master.bridge_ip().await?;

        let mut replicas = Vec::with_capacity(config.num_replicas);
        for _ in 0..config.num_replicas {
            replicas.push(RedisReplica::new(master_ip).await?);
        }

        let mut sentinels = Vec::with_capacity(config.num_sentinels);
        for _ in 0..config.num_sentinels {
            sentinels.push(RedisSentinel::new(master_ip, &config).await?);
        }

        Ok(Self {
            config,
            master,
            replicas,
            sentinels,
        })
    }

    /// The service name the sentinels monitor.
    pub fn name(&self) -> &str {
        &self.config.service_name
    }

    pub fn master(&self) -> &RedisMaster {
        &self.master
    }

    pub async fn master_ip(&self) -> Result<IpAddr> {
        self.master.bridge_ip().await
    }

    pub async fn replica_ips(&self) -> Result<Vec<IpAddr>> {
        let mut addresses = Vec::with_capacity(self.replicas.len());
        for replica in &self.replicas {
            addresses.push(replica.bridge_ip().await?);
        }
        Ok(addresses)
    }

    /// Host-mapped sentinel URLs, e.g. `redis://127.0.0.1:49153`.
    pub async fn sentinel_urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(self.sentinels.len());
        for sentinel in &self.sentinels {
            urls.push(sentinel.url().await?);
        }
        Ok(urls)
    }

    /// Stops the current primary so that the sentinels elect a replica.
    pub async fn kill_master(&self) -> Result<()> {
        self.master.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_redis_ha_setup() -> Result<()> {
        let config = RedisHAConfig::builder()
            .num_replicas(2)
            .num_sentinels(3)
            .quorum(2)
            .build();

        let ha = RedisHA::new(config).await?;
        assert_eq!(ha.replicas.len(), 2);
        assert_eq!(ha.sentinel_urls().await?.len(), 3);
        Ok(())
    }
}
