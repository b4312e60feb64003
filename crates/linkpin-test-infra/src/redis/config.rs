use thiserror::Error;
use typed_builder::TypedBuilder;

/// Shape and failover timing of a Sentinel-managed Redis deployment.
///
/// Timings are tuned for tests: a dead primary is noticed after one second
/// and a stuck failover is abandoned after five.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisHAConfig {
    #[builder(default = 2)]
    pub num_replicas: usize,
    #[builder(default = 3)]
    pub num_sentinels: usize,
    /// Sentinels that must agree the primary is down.
    #[builder(default = 2)]
    pub quorum: usize,
    #[builder(default = "linkpin-primary".to_string(), setter(into))]
    pub service_name: String,
    #[builder(default = 1_000)]
    pub down_after_ms: u64,
    #[builder(default = 5_000)]
    pub failover_timeout_ms: u64,
}

impl Default for RedisHAConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one sentinel is required")]
    NoSentinels,
    #[error("quorum {quorum} is outside 1..={sentinels}")]
    Quorum { quorum: usize, sentinels: usize },
}

impl RedisHAConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.num_sentinels, self.quorum) {
            (0, _) => Err(ConfigError::NoSentinels),
            (sentinels, quorum) if quorum == 0 || quorum > sentinels => {
                Err(ConfigError::Quorum { quorum, sentinels })
            }
            _ => Ok(()),
        }
    }
}
