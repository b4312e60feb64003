use std::net::IpAddr;

use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use super::{RedisHAConfig, REDIS_IMAGE, REDIS_PORT, REDIS_TAG, SENTINEL_PORT};
use crate::Result;

pub struct RedisSentinel {
    container: ContainerAsync<GenericImage>,
}

impl RedisSentinel {
    pub async fn new(primary_ip: IpAddr, config: &RedisHAConfig) -> Result<Self> {
        // sentinel rewrites its config file, so it has to live somewhere writable
        let script = format!(
            "printf '%s\\n' \
             'port {port}' \
             'protected-mode no' \
             'sentinel monitor {name} {ip} {primary_port} {quorum}' \
             'sentinel down-after-milliseconds {name} {down_after}' \
             'sentinel failover-timeout {name} {failover_timeout}' \
             'sentinel parallel-syncs {name} 1' \
             > /tmp/sentinel.conf && exec redis-sentinel /tmp/sentinel.conf",
            port = SENTINEL_PORT,
            name = config.service_name,
            ip = primary_ip,
            primary_port = REDIS_PORT,
            quorum = config.quorum,
            down_after = config.down_after_ms,
            failover_timeout = config.failover_timeout_ms,
        );

        let container = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
            .with_exposed_port(SENTINEL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("+monitor master"))
            .with_cmd(vec!["sh".to_string(), "-c".to_string(), script])
            .start()
            .await?;

        Ok(Self { container })
    }

    pub async fn host(&self) -> Result<String> {
        Ok(self.container.get_host().await?.to_string())
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(SENTINEL_PORT).await?)
    }

    /// Host-mapped connection URL.
    pub async fn url(&self) -> Result<String> {
        Ok(format!("redis://{}:{}", self.host().await?, self.port().await?))
    }
}
