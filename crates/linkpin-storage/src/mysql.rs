use async_trait::async_trait;
use jiff::Timestamp;
use linkpin_core::store::Result;
use linkpin_core::{MappingStore, ShortCode, StorageError, UrlMapping};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{debug, trace};

const CREATE_TABLE: &str = include_str!("../ddl/mysql/url_mappings.sql");

const INSERT_MAPPING: &str =
    "INSERT INTO url_mappings (short_code, original_url, created_at) VALUES (?, ?, ?)";

const SELECT_MAPPING: &str =
    "SELECT original_url, created_at FROM url_mappings WHERE short_code = ?";

/// MySQL implementation of the mapping store.
///
/// `created_at` is stored as unix milliseconds. A second write for the same
/// short code is rejected rather than overwriting the first.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and creates the table if needed.
    ///
    /// `acquire_timeout` bounds how long a call waits for a free connection.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("failed to connect to mysql", e))?;

        let repository = Self::new(pool);
        repository.ensure_schema().await?;
        Ok(repository)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("failed to create url_mappings", e))?;
        debug!("url_mappings table ready");
        Ok(())
    }
}

fn parse_created_at(millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{millis}': {e}"))
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    use sqlx::Error;

    let message = format!("{operation}: {err}");
    match err {
        Error::PoolTimedOut => StorageError::Timeout(message),
        Error::Io(_) | Error::Tls(_) | Error::PoolClosed | Error::WorkerCrashed => {
            StorageError::Unavailable(message)
        }
        Error::Decode(_) | Error::ColumnDecode { .. } | Error::ColumnNotFound(_) => {
            StorageError::InvalidData(message)
        }
        Error::Database(db) if db.is_unique_violation() => StorageError::Operation(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl MappingStore for MySqlRepository {
    async fn put(&self, mapping: &UrlMapping) -> Result<()> {
        sqlx::query(INSERT_MAPPING)
            .bind(mapping.short_code.as_str())
            .bind(mapping.original_url.as_str())
            .bind(mapping.created_at.as_millisecond())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("failed to store mapping", e))?;

        trace!(code = %mapping.short_code, "mapping stored");
        Ok(())
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        let row: Option<(String, i64)> = sqlx::query_as(SELECT_MAPPING)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("failed to fetch mapping", e))?;

        row.map(|(original_url, created_at)| {
            Ok(UrlMapping::new(
                code.clone(),
                original_url,
                parse_created_at(created_at)?,
            ))
        })
        .transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mysql ping failed", e))?;
        Ok(())
    }
}
