use std::net::IpAddr;

use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use super::{REDIS_IMAGE, REDIS_PORT, REDIS_TAG};
use crate::Result;

pub struct RedisReplica {
    container: ContainerAsync<GenericImage>,
}

impl RedisReplica {
    pub async fn new(primary_ip: IpAddr) -> Result<Self> {
        let container = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .with_cmd(vec![
                "redis-server".to_string(),
                "--replicaof".to_string(),
                primary_ip.to_string(),
                REDIS_PORT.to_string(),
            ])
            .start()
            .await?;
        Ok(Self { container })
    }

    pub async fn bridge_ip(&self) -> Result<IpAddr> {
        Ok(self.container.get_bridge_ip_address().await?)
    }
}
