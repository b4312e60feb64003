use clap::{Parser, ValueEnum};
use linkpin_core::shortcode::MAX_LENGTH;
use linkpin_storage::ConsistencyLevel;
use linkpin_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "LINKPIN_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "LINKPIN_BASE_URL";
pub const SALT_ENV: &str = "LINKPIN_SALT";
pub const MIN_CODE_LENGTH_ENV: &str = "LINKPIN_MIN_CODE_LENGTH";
pub const LOG_FORMAT_ENV: &str = "LINKPIN_LOG_FORMAT";

pub const ALLOCATOR_BACKEND_ENV: &str = "LINKPIN_ALLOCATOR";
pub const REDIS_URL_ENV: &str = "LINKPIN_REDIS_URL";
pub const SENTINELS_ENV: &str = "LINKPIN_REDIS_SENTINELS";
pub const PRIMARY_NAME_ENV: &str = "LINKPIN_REDIS_PRIMARY_NAME";
pub const REDIS_PASSWORD_ENV: &str = "LINKPIN_REDIS_PASSWORD";
pub const COUNTER_KEY_ENV: &str = "LINKPIN_COUNTER_KEY";
pub const COUNTER_INITIAL_ENV: &str = "LINKPIN_COUNTER_INITIAL_VALUE";
pub const MIN_REPLICA_ACKS_ENV: &str = "LINKPIN_COUNTER_MIN_REPLICA_ACKS";
pub const TOPOLOGY_POLL_MS_ENV: &str = "LINKPIN_TOPOLOGY_POLL_INTERVAL_MS";

pub const STORE_BACKEND_ENV: &str = "LINKPIN_STORE";
pub const CASSANDRA_NODES_ENV: &str = "LINKPIN_CASSANDRA_NODES";
pub const CASSANDRA_KEYSPACE_ENV: &str = "LINKPIN_CASSANDRA_KEYSPACE";
pub const CASSANDRA_DC_ENV: &str = "LINKPIN_CASSANDRA_LOCAL_DC";
pub const CASSANDRA_RF_ENV: &str = "LINKPIN_CASSANDRA_REPLICATION_FACTOR";
pub const CASSANDRA_READ_CL_ENV: &str = "LINKPIN_CASSANDRA_READ_CONSISTENCY";
pub const CASSANDRA_WRITE_CL_ENV: &str = "LINKPIN_CASSANDRA_WRITE_CONSISTENCY";
pub const CASSANDRA_USERNAME_ENV: &str = "LINKPIN_CASSANDRA_USERNAME";
pub const CASSANDRA_PASSWORD_ENV: &str = "LINKPIN_CASSANDRA_PASSWORD";
pub const MYSQL_DSN_ENV: &str = "LINKPIN_MYSQL_DSN";

pub const ALLOCATOR_TIMEOUT_MS_ENV: &str = "LINKPIN_ALLOCATOR_TIMEOUT_MS";
pub const STORE_TIMEOUT_MS_ENV: &str = "LINKPIN_STORE_TIMEOUT_MS";

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PRIMARY_NAME: &str = "mymaster";
pub const DEFAULT_KEYSPACE: &str = "url_shortener";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AllocatorBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
    #[value(name = "sentinel")]
    Sentinel,
}

impl Display for AllocatorBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocatorBackendArg::InMemory => write!(f, "in-memory"),
            AllocatorBackendArg::Redis => write!(f, "redis"),
            AllocatorBackendArg::Sentinel => write!(f, "sentinel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "cassandra")]
    Cassandra,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StoreBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendArg::InMemory => write!(f, "in-memory"),
            StoreBackendArg::Cassandra => write!(f, "cassandra"),
            StoreBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkpin", version, about = "URL shortener HTTP gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public prefix of issued short URLs.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Codec salt. Changing it invalidates every issued code.
    #[arg(long, env = SALT_ENV, default_value = "", hide_env_values = true)]
    pub salt: String,

    #[arg(long, env = MIN_CODE_LENGTH_ENV, default_value_t = 0)]
    pub min_code_length: usize,

    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(
        long,
        env = ALLOCATOR_BACKEND_ENV,
        value_enum,
        default_value_t = AllocatorBackendArg::InMemory
    )]
    pub allocator: AllocatorBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("allocator", "redis"))]
    pub redis_url: Option<String>,

    /// Comma separated sentinel URLs, e.g. `redis://sentinel-1:26379`.
    #[arg(
        long,
        env = SENTINELS_ENV,
        value_delimiter = ',',
        required_if_eq("allocator", "sentinel")
    )]
    pub sentinels: Vec<String>,

    #[arg(long, env = PRIMARY_NAME_ENV, default_value = DEFAULT_PRIMARY_NAME)]
    pub primary_name: String,

    #[arg(long, env = REDIS_PASSWORD_ENV, hide_env_values = true)]
    pub redis_password: Option<String>,

    #[arg(long, env = COUNTER_KEY_ENV, default_value = linkpin_allocator::DEFAULT_COUNTER_KEY)]
    pub counter_key: String,

    #[arg(long, env = COUNTER_INITIAL_ENV, default_value_t = linkpin_allocator::DEFAULT_INITIAL_VALUE)]
    pub counter_initial_value: u64,

    #[arg(long, env = MIN_REPLICA_ACKS_ENV, default_value_t = 0)]
    pub min_replica_acks: u32,

    #[arg(long, env = TOPOLOGY_POLL_MS_ENV, default_value_t = 1_000)]
    pub topology_poll_interval_ms: u64,

    #[arg(
        long,
        env = STORE_BACKEND_ENV,
        value_enum,
        default_value_t = StoreBackendArg::InMemory
    )]
    pub store: StoreBackendArg,

    /// Comma separated contact points as `host:port`.
    #[arg(
        long,
        env = CASSANDRA_NODES_ENV,
        value_delimiter = ',',
        required_if_eq("store", "cassandra")
    )]
    pub cassandra_nodes: Vec<String>,

    #[arg(long, env = CASSANDRA_KEYSPACE_ENV, default_value = DEFAULT_KEYSPACE)]
    pub cassandra_keyspace: String,

    #[arg(long, env = CASSANDRA_DC_ENV)]
    pub cassandra_local_dc: Option<String>,

    #[arg(long, env = CASSANDRA_RF_ENV, default_value_t = 1)]
    pub cassandra_replication_factor: u32,

    #[arg(long, env = CASSANDRA_READ_CL_ENV, default_value_t = ConsistencyLevel::LocalOne)]
    pub cassandra_read_consistency: ConsistencyLevel,

    #[arg(long, env = CASSANDRA_WRITE_CL_ENV, default_value_t = ConsistencyLevel::LocalOne)]
    pub cassandra_write_consistency: ConsistencyLevel,

    #[arg(long, env = CASSANDRA_USERNAME_ENV, requires = "cassandra_password")]
    pub cassandra_username: Option<String>,

    #[arg(long, env = CASSANDRA_PASSWORD_ENV, hide_env_values = true)]
    pub cassandra_password: Option<String>,

    #[arg(
        long,
        env = MYSQL_DSN_ENV,
        hide_env_values = true,
        required_if_eq("store", "mysql")
    )]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = ALLOCATOR_TIMEOUT_MS_ENV, default_value_t = 2_000)]
    pub allocator_timeout_ms: u64,

    #[arg(long, env = STORE_TIMEOUT_MS_ENV, default_value_t = 2_000)]
    pub store_timeout_ms: u64,
}

impl CLI {
    /// Checks combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.salt.is_empty() && self.allocator != AllocatorBackendArg::InMemory {
            return Err(format!(
                "{SALT_ENV} must be set when the allocator is {}",
                self.allocator
            ));
        }
        if self.min_code_length > MAX_LENGTH {
            return Err(format!(
                "{MIN_CODE_LENGTH_ENV} must be at most {MAX_LENGTH}, got {}",
                self.min_code_length
            ));
        }
        if self.allocator_timeout_ms == 0 || self.store_timeout_ms == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        if self.topology_poll_interval_ms == 0 {
            return Err(format!("{TOPOLOGY_POLL_MS_ENV} must be greater than zero"));
        }
        Ok(())
    }

    pub fn allocator_timeout(&self) -> Duration {
        Duration::from_millis(self.allocator_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn topology_poll_interval(&self) -> Duration {
        Duration::from_millis(self.topology_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CLI, clap::Error> {
        CLI::try_parse_from(std::iter::once("linkpin").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_in_memory_backends() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.allocator, AllocatorBackendArg::InMemory);
        assert_eq!(cli.store, StoreBackendArg::InMemory);
        assert_eq!(cli.counter_initial_value, 14_000_000);
        assert_eq!(cli.allocator_timeout(), Duration::from_secs(2));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn sentinel_backend_requires_sentinels() {
        assert!(parse(&["--allocator", "sentinel"]).is_err());

        let cli = parse(&[
            "--allocator",
            "sentinel",
            "--sentinels",
            "redis://s1:26379,redis://s2:26379",
            "--salt",
            "secret",
        ])
        .unwrap();
        assert_eq!(cli.sentinels.len(), 2);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn shared_allocator_requires_a_salt() {
        let cli = parse(&["--allocator", "redis", "--redis-url", "redis://r:6379"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn min_code_length_must_fit_a_short_code() {
        let cli = parse(&["--min-code-length", "64"]).unwrap();
        assert!(cli.validate().is_ok());

        let cli = parse(&["--min-code-length", "65"]).unwrap();
        let err = cli.validate().unwrap_err();
        assert!(err.contains(MIN_CODE_LENGTH_ENV), "{err}");
    }

    #[test]
    fn parses_consistency_levels() {
        let cli = parse(&[
            "--store",
            "cassandra",
            "--cassandra-nodes",
            "c1:9042",
            "--cassandra-write-consistency",
            "local_quorum",
        ])
        .unwrap();
        assert_eq!(cli.cassandra_write_consistency, ConsistencyLevel::LocalQuorum);
        assert_eq!(cli.cassandra_read_consistency, ConsistencyLevel::LocalOne);
    }

    #[test]
    fn help_and_version_exit_successfully() {
        let help = parse(&["--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(help.exit_code(), 0);

        let version = parse(&["--version"]).unwrap_err();
        assert_eq!(version.kind(), clap::error::ErrorKind::DisplayVersion);
        assert_eq!(version.exit_code(), 0);
    }

    #[test]
    fn mysql_backend_requires_dsn() {
        assert!(parse(&["--store", "mysql"]).is_err());
    }
}
