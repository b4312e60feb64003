use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use typed_builder::TypedBuilder;

use crate::Result;

const CQL_PORT: u16 = 9042;

#[derive(Debug, Clone, TypedBuilder)]
pub struct CassandraConfig {
    #[builder(default = "5.0".to_string(), setter(into))]
    tag: String,
    #[builder(default = "dc1".to_string(), setter(into))]
    datacenter: String,
}

impl Default for CassandraConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Test fixture for a single-node Cassandra cluster.
pub struct CassandraNode {
    container: ContainerAsync<GenericImage>,
    config: CassandraConfig,
}

impl CassandraNode {
    /// Starts a node and waits until it accepts CQL connections.
    pub async fn new(config: CassandraConfig) -> Result<Self> {
        let container = GenericImage::new("cassandra", config.tag.as_str())
            .with_exposed_port(CQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(
                "Starting listening for CQL clients",
            ))
            .with_env_var("CASSANDRA_DC", config.datacenter.as_str())
            .with_env_var("CASSANDRA_ENDPOINT_SNITCH", "GossipingPropertyFileSnitch")
            .with_env_var("MAX_HEAP_SIZE", "512M")
            .with_env_var("HEAP_NEWSIZE", "128M")
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// Contact point as `host:port`.
    pub async fn contact_point(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(CQL_PORT).await?;
        Ok(format!("{host}:{port}"))
    }

    pub fn datacenter(&self) -> &str {
        &self.config.datacenter
    }

    /// Stops the node, simulating a store outage.
    pub async fn stop(&self) -> Result<()> {
        Ok(self.container.stop().await?)
    }
}
