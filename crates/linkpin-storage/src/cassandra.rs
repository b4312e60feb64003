use async_trait::async_trait;
use jiff::Timestamp;
use linkpin_core::store::Result;
use linkpin_core::{MappingStore, ShortCode, StorageError, UrlMapping};
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{
    DbError, ExecutionError, NewSessionError, PrepareError, RequestAttemptError, UseKeyspaceError,
};
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::Consistency;
use scylla::value::CqlTimestamp;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

const CREATE_TABLE: &str = include_str!("../ddl/cql/url_mappings.cql");

const INSERT_MAPPING: &str =
    "INSERT INTO url_mappings (short_code, original_url, created_at) VALUES (?, ?, ?)";

const SELECT_MAPPING: &str =
    "SELECT original_url, created_at FROM url_mappings WHERE short_code = ?";

const PING: &str = "SELECT now() FROM system.local";

/// Per-statement consistency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl From<ConsistencyLevel> for Consistency {
    fn from(level: ConsistencyLevel) -> Self {
        match level {
            ConsistencyLevel::Any => Consistency::Any,
            ConsistencyLevel::One => Consistency::One,
            ConsistencyLevel::Two => Consistency::Two,
            ConsistencyLevel::Three => Consistency::Three,
            ConsistencyLevel::Quorum => Consistency::Quorum,
            ConsistencyLevel::All => Consistency::All,
            ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
            ConsistencyLevel::LocalOne => Consistency::LocalOne,
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "any" => Ok(Self::Any),
            "one" => Ok(Self::One),
            "two" => Ok(Self::Two),
            "three" => Ok(Self::Three),
            "quorum" => Ok(Self::Quorum),
            "all" => Ok(Self::All),
            "local-quorum" => Ok(Self::LocalQuorum),
            "each-quorum" => Ok(Self::EachQuorum),
            "local-one" => Ok(Self::LocalOne),
            other => Err(format!("unknown consistency level '{other}'")),
        }
    }
}

impl Display for ConsistencyLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::One => "one",
            Self::Two => "two",
            Self::Three => "three",
            Self::Quorum => "quorum",
            Self::All => "all",
            Self::LocalQuorum => "local-quorum",
            Self::EachQuorum => "each-quorum",
            Self::LocalOne => "local-one",
        };
        f.write_str(name)
    }
}

/// Connection and replication settings for [`CassandraRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct CassandraSettings {
    /// Contact points as `host:port`.
    pub nodes: Vec<String>,
    #[builder(setter(into))]
    pub keyspace: String,
    /// Enables datacenter-aware routing and `NetworkTopologyStrategy`.
    #[builder(default, setter(into))]
    pub local_datacenter: Option<String>,
    #[builder(default = 1)]
    pub replication_factor: u32,
    #[builder(default = ConsistencyLevel::LocalOne)]
    pub read_consistency: ConsistencyLevel,
    #[builder(default = ConsistencyLevel::LocalOne)]
    pub write_consistency: ConsistencyLevel,
    /// Driver-side deadline for a single request, retries included.
    #[builder(default = Duration::from_secs(2))]
    pub request_timeout: Duration,
    #[builder(default, setter(into))]
    pub credentials: Option<(String, String)>,
}

impl CassandraSettings {
    fn replication(&self) -> String {
        match &self.local_datacenter {
            Some(dc) => format!(
                "{{'class': 'NetworkTopologyStrategy', '{dc}': {}}}",
                self.replication_factor
            ),
            None => format!(
                "{{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                self.replication_factor
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(StorageError::Initialization(
                "at least one cassandra node is required".to_string(),
            ));
        }
        let valid_identifier = |name: &str| {
            !name.is_empty()
                && name.len() <= 48
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !valid_identifier(&self.keyspace) {
            return Err(StorageError::Initialization(format!(
                "invalid keyspace name '{}'",
                self.keyspace
            )));
        }
        if let Some(dc) = &self.local_datacenter {
            if !dc
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(StorageError::Initialization(format!(
                    "invalid datacenter name '{dc}'"
                )));
            }
        }
        if self.replication_factor == 0 {
            return Err(StorageError::Initialization(
                "replication factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cassandra (or ScyllaDB) implementation of the mapping store.
///
/// The driver load-balances across nodes and retries transient per-node
/// failures. Writes are idempotent upserts keyed by short code, so a retried
/// write can never produce a second row.
pub struct CassandraRepository {
    session: Session,
    insert: PreparedStatement,
    select: PreparedStatement,
}

impl std::fmt::Debug for CassandraRepository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraRepository").finish_non_exhaustive()
    }
}

impl CassandraRepository {
    /// Connects to the cluster, creates the keyspace and table if needed, and
    /// prepares the statements.
    pub async fn connect(settings: CassandraSettings) -> Result<Self> {
        settings.validate()?;

        let mut profile = ExecutionProfile::builder()
            .consistency(settings.read_consistency.into())
            .request_timeout(Some(settings.request_timeout));
        if let Some(dc) = &settings.local_datacenter {
            profile = profile.load_balancing_policy(
                DefaultPolicy::builder()
                    .prefer_datacenter(dc.clone())
                    .token_aware(true)
                    .build(),
            );
        }

        let mut builder = SessionBuilder::new()
            .known_nodes(&settings.nodes)
            .default_execution_profile_handle(profile.build().into_handle());
        if let Some((username, password)) = &settings.credentials {
            builder = builder.user(username, password);
        }

        info!(nodes = ?settings.nodes, keyspace = %settings.keyspace, "connecting to cassandra cluster");
        let session = builder
            .build()
            .await
            .map_err(|e| map_session_error("failed to connect to cassandra", e))?;

        Self::ensure_schema(&session, &settings).await?;

        let mut insert = session
            .prepare(INSERT_MAPPING)
            .await
            .map_err(|e| map_prepare_error("failed to prepare insert", e))?;
        insert.set_consistency(settings.write_consistency.into());
        insert.set_is_idempotent(true);

        let mut select = session
            .prepare(SELECT_MAPPING)
            .await
            .map_err(|e| map_prepare_error("failed to prepare select", e))?;
        select.set_consistency(settings.read_consistency.into());
        select.set_is_idempotent(true);

        info!(
            keyspace = %settings.keyspace,
            read_consistency = %settings.read_consistency,
            write_consistency = %settings.write_consistency,
            "cassandra mapping store ready"
        );

        Ok(Self {
            session,
            insert,
            select,
        })
    }

    async fn ensure_schema(session: &Session, settings: &CassandraSettings) -> Result<()> {
        debug!(keyspace = %settings.keyspace, "creating keyspace if not exists");
        let create_keyspace = format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {}",
            settings.keyspace,
            settings.replication()
        );
        session
            .query_unpaged(create_keyspace, ())
            .await
            .map_err(|e| map_execution_error("failed to create keyspace", e))?;

        session
            .use_keyspace(settings.keyspace.as_str(), false)
            .await
            .map_err(|e| map_use_keyspace_error("failed to use keyspace", e))?;

        session
            .query_unpaged(CREATE_TABLE, ())
            .await
            .map_err(|e| map_execution_error("failed to create table", e))?;
        debug!("url_mappings table ready");
        Ok(())
    }
}

fn map_execution_error(operation: &str, err: ExecutionError) -> StorageError {
    match err {
        ExecutionError::RequestTimeout(elapsed) => {
            StorageError::Timeout(format!("{operation}: no response within {elapsed:?}"))
        }
        ExecutionError::EmptyPlan | ExecutionError::ConnectionPoolError(_) => {
            StorageError::Unavailable(format!("{operation}: {err}"))
        }
        ExecutionError::LastAttemptError(attempt) => map_attempt_error(operation, attempt),
        ExecutionError::PrepareError(prepare) => map_prepare_error(operation, prepare),
        ExecutionError::UseKeyspaceError(use_keyspace) => {
            map_use_keyspace_error(operation, use_keyspace)
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

fn map_attempt_error(operation: &str, err: RequestAttemptError) -> StorageError {
    match err {
        RequestAttemptError::DbError(db, message) => map_db_error(operation, db, &message),
        RequestAttemptError::BrokenConnectionError(_)
        | RequestAttemptError::UnableToAllocStreamId => {
            StorageError::Unavailable(format!("{operation}: {err}"))
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

fn map_db_error(operation: &str, err: DbError, message: &str) -> StorageError {
    let detail = format!("{operation}: {err}: {message}");
    match err {
        DbError::Unavailable { .. }
        | DbError::Overloaded
        | DbError::IsBootstrapping
        | DbError::RateLimitReached { .. } => StorageError::Unavailable(detail),
        DbError::ReadTimeout { .. } | DbError::WriteTimeout { .. } => StorageError::Timeout(detail),
        _ => StorageError::Query(detail),
    }
}

fn map_prepare_error(operation: &str, err: PrepareError) -> StorageError {
    match err {
        PrepareError::ConnectionPoolError(_) => {
            StorageError::Unavailable(format!("{operation}: {err}"))
        }
        PrepareError::AllAttemptsFailed { first_attempt } => {
            map_attempt_error(operation, first_attempt)
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

fn map_use_keyspace_error(operation: &str, err: UseKeyspaceError) -> StorageError {
    match err {
        UseKeyspaceError::RequestError(attempt) => map_attempt_error(operation, attempt),
        UseKeyspaceError::RequestTimeout(elapsed) => {
            StorageError::Timeout(format!("{operation}: no response within {elapsed:?}"))
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

fn map_session_error(operation: &str, err: NewSessionError) -> StorageError {
    match err {
        NewSessionError::EmptyKnownNodesList => {
            StorageError::Initialization(format!("{operation}: {err}"))
        }
        // unresolvable hosts and failed metadata fetches mean the cluster is unreachable
        other => StorageError::Unavailable(format!("{operation}: {other}")),
    }
}

fn parse_created_at(raw: Option<CqlTimestamp>, code: &ShortCode) -> Result<Timestamp> {
    let CqlTimestamp(millis) = raw.ok_or_else(|| {
        StorageError::InvalidData(format!("mapping '{code}' has no created_at"))
    })?;
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{millis}': {e}"))
    })
}

#[async_trait]
impl MappingStore for CassandraRepository {
    async fn put(&self, mapping: &UrlMapping) -> Result<()> {
        let created_at = CqlTimestamp(mapping.created_at.as_millisecond());
        self.session
            .execute_unpaged(
                &self.insert,
                (
                    mapping.short_code.as_str(),
                    mapping.original_url.as_str(),
                    created_at,
                ),
            )
            .await
            .map_err(|e| {
                warn!(code = %mapping.short_code, error = %e, "failed to store mapping");
                map_execution_error("failed to store mapping", e)
            })?;

        trace!(code = %mapping.short_code, "mapping stored");
        Ok(())
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        let result = self
            .session
            .execute_unpaged(&self.select, (code.as_str(),))
            .await
            .map_err(|e| map_execution_error("failed to fetch mapping", e))?;

        let rows = result
            .into_rows_result()
            .map_err(|e| StorageError::InvalidData(format!("unexpected response: {e}")))?;
        let row = rows
            .maybe_first_row::<(String, Option<CqlTimestamp>)>()
            .map_err(|e| StorageError::InvalidData(format!("invalid mapping row: {e}")))?;

        let Some((original_url, created_at)) = row else {
            trace!(code = %code, "no mapping for short code");
            return Ok(None);
        };

        Ok(Some(UrlMapping {
            short_code: code.clone(),
            original_url,
            created_at: parse_created_at(created_at, code)?,
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.session
            .query_unpaged(PING, ())
            .await
            .map_err(|e| map_execution_error("cassandra ping failed", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CassandraSettings {
        CassandraSettings::builder()
            .nodes(vec!["127.0.0.1:9042".to_string()])
            .keyspace("linkpin")
            .build()
    }

    #[test]
    fn defaults() {
        let settings = settings();
        assert_eq!(settings.replication_factor, 1);
        assert_eq!(settings.read_consistency, ConsistencyLevel::LocalOne);
        assert_eq!(settings.write_consistency, ConsistencyLevel::LocalOne);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn simple_strategy_without_datacenter() {
        assert_eq!(
            settings().replication(),
            "{'class': 'SimpleStrategy', 'replication_factor': 1}"
        );
    }

    #[test]
    fn network_topology_with_datacenter() {
        let settings = CassandraSettings::builder()
            .nodes(vec!["10.0.0.1:9042".to_string()])
            .keyspace("linkpin")
            .local_datacenter("dc1".to_string())
            .replication_factor(3)
            .build();
        assert_eq!(
            settings.replication(),
            "{'class': 'NetworkTopologyStrategy', 'dc1': 3}"
        );
    }

    #[test]
    fn rejects_unsafe_keyspace_names() {
        let mut settings = settings();
        settings.keyspace = "linkpin; DROP KEYSPACE system".to_string();
        assert!(matches!(
            settings.validate(),
            Err(StorageError::Initialization(_))
        ));
    }

    #[test]
    fn rejects_empty_node_list() {
        let mut settings = settings();
        settings.nodes.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn consistency_levels_parse() {
        assert_eq!("quorum".parse(), Ok(ConsistencyLevel::Quorum));
        assert_eq!("LOCAL_QUORUM".parse(), Ok(ConsistencyLevel::LocalQuorum));
        assert_eq!("local-one".parse(), Ok(ConsistencyLevel::LocalOne));
        assert!("most".parse::<ConsistencyLevel>().is_err());
        assert_eq!(ConsistencyLevel::EachQuorum.to_string(), "each-quorum");
    }

    #[test]
    fn created_at_round_trips_through_millis() {
        let code = ShortCode::new_unchecked("abc");
        let ts = Timestamp::from_millisecond(1_700_000_000_123).unwrap();
        let parsed = parse_created_at(Some(CqlTimestamp(ts.as_millisecond())), &code).unwrap();
        assert_eq!(parsed, ts);
        assert!(parse_created_at(None, &code).is_err());
    }

    fn db_failure(db: DbError) -> ExecutionError {
        ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            db,
            "from coordinator".to_string(),
        ))
    }

    #[test]
    fn replica_shortage_is_retriable() {
        let err = map_execution_error(
            "put",
            db_failure(DbError::Unavailable {
                consistency: Consistency::LocalQuorum,
                required: 2,
                alive: 1,
            }),
        );
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(err.is_retriable());

        let err = map_execution_error("put", db_failure(DbError::Overloaded));
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn driver_timeouts_are_retriable() {
        let err = map_execution_error(
            "get",
            ExecutionError::RequestTimeout(Duration::from_secs(2)),
        );
        assert!(matches!(err, StorageError::Timeout(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn empty_plan_means_no_reachable_node() {
        let err = map_execution_error("get", ExecutionError::EmptyPlan);
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn server_rejections_are_not_retriable() {
        let err = map_execution_error("put", db_failure(DbError::SyntaxError));
        assert!(matches!(err, StorageError::Query(_)));

        // the server message is free text and must not drive classification
        let err = map_execution_error(
            "put",
            ExecutionError::LastAttemptError(RequestAttemptError::DbError(
                DbError::Invalid,
                "connection unavailable, timed out".to_string(),
            )),
        );
        assert!(matches!(err, StorageError::Query(_)));
        assert!(!err.is_retriable());
    }

    #[test]
    fn empty_node_list_is_a_configuration_error() {
        let err = map_session_error("connect", NewSessionError::EmptyKnownNodesList);
        assert!(matches!(err, StorageError::Initialization(_)));
    }
}
