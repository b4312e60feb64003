use std::net::IpAddr;

use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use super::{REDIS_IMAGE, REDIS_PORT, REDIS_TAG};
use crate::Result;

/// A standalone Redis node, also used as the initial primary of [`RedisHA`](super::RedisHA).
pub struct RedisMaster {
    container: ContainerAsync<GenericImage>,
}

impl RedisMaster {
    pub async fn new() -> Result<Self> {
        let container = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await?;
        Ok(Self { container })
    }

    pub async fn host(&self) -> Result<String> {
        let host = self.container.get_host().await?.to_string();
        Ok(match host.as_str() {
            "localhost" => String::from("127.0.0.1"),
            _ => host,
        })
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(REDIS_PORT).await?)
    }

    /// Host-mapped connection URL.
    pub async fn url(&self) -> Result<String> {
        Ok(format!("redis://{}:{}", self.host().await?, self.port().await?))
    }

    /// Address on the docker bridge, as seen by other containers.
    pub async fn bridge_ip(&self) -> Result<IpAddr> {
        Ok(self.container.get_bridge_ip_address().await?)
    }

    /// Stops the container, simulating a primary crash.
    pub async fn stop(&self) -> Result<()> {
        Ok(self.container.stop().await?)
    }

    /// Returns the underlying container reference.
    pub fn container(&self) -> &ContainerAsync<GenericImage> {
        &self.container
    }
}
