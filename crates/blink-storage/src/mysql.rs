use async_trait::async_trait;
use blink_core::{
    LinkStore, MetricsSnapshot, MetricsStore, ShortCode, StorageError, VisitCounts,
};
use jiff::Timestamp;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::collections::HashMap;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, StorageError>;

/// DDL for the tables this store reads and writes.
pub const SCHEMA: [&str; 2] = [
    include_str!("../ddl/mysql/short_urls.sql"),
    include_str!("../ddl/mysql/short_url_metrics.sql"),
];

/// MySQL implementation of the store contracts.
///
/// Links live in `short_urls`, keyed by short code. Every metrics flush
/// appends one row per short code to `short_url_metrics`, stamped with the
/// flush time in unix milliseconds; reads sum the rows of a time range.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn to_sql_count(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("count {value} does not fit a BIGINT")))
}

fn from_sql_count(value: Option<i64>) -> Result<u64> {
    let value = value.unwrap_or_default();
    u64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("negative count {value} in metrics")))
}

#[async_trait]
impl LinkStore for MySqlStore {
    async fn create_link(&self, code: &ShortCode, long_url: &str) -> Result<()> {
        let now = Timestamp::now().as_second();

        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (id, long_url, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(code.as_str())
        .bind(long_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                // A replay of the same mapping is not a conflict.
                match self.get_long_url(code).await? {
                    Some(existing) if existing == long_url => {
                        debug!(code = %code, "short url already stored with the same long url");
                        Ok(())
                    }
                    _ => Err(StorageError::Conflict(code.to_string())),
                }
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete_link(&self, code: &ShortCode) -> Result<()> {
        sqlx::query("DELETE FROM short_urls WHERE id = ?")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_long_url(&self, code: &ShortCode) -> Result<Option<String>> {
        let row = sqlx::query("SELECT long_url FROM short_urls WHERE id = ? LIMIT 1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get("long_url").map_err(map_sqlx_error))
            .transpose()
    }
}

#[async_trait]
impl MetricsStore for MySqlStore {
    async fn create_metrics_batch(&self, batch: &HashMap<ShortCode, VisitCounts>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let recorded_at = Timestamp::now().as_millisecond();
        let rows = batch
            .iter()
            .map(|(code, counts)| {
                Ok((
                    code.as_str(),
                    to_sql_count(counts.visits)?,
                    to_sql_count(counts.unique_visits)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut query: QueryBuilder<MySql> = QueryBuilder::new(
            "INSERT INTO short_url_metrics (short_url_id, visit_count, unique_visit_count, recorded_at) ",
        );
        query.push_values(rows, |mut values, (code, visits, unique_visits)| {
            values
                .push_bind(code)
                .push_bind(visits)
                .push_bind(unique_visits)
                .push_bind(recorded_at);
        });

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        query
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        trace!(rows = batch.len(), "inserted metrics batch");
        Ok(())
    }

    async fn get_metrics(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Option<MetricsSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT CAST(SUM(visit_count) AS SIGNED) AS visits,
                   CAST(SUM(unique_visit_count) AS SIGNED) AS unique_visits
            FROM short_url_metrics
            WHERE short_url_id = ?
              AND recorded_at BETWEEN ? AND ?
            GROUP BY short_url_id
            "#,
        )
        .bind(code.as_str())
        .bind(from.as_millisecond())
        .bind(to.as_millisecond())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let visits: Option<i64> = row.try_get("visits").map_err(map_sqlx_error)?;
        let unique_visits: Option<i64> = row.try_get("unique_visits").map_err(map_sqlx_error)?;

        Ok(Some(MetricsSnapshot {
            code: code.clone(),
            visits: from_sql_count(visits)?,
            unique_visits: from_sql_count(unique_visits)?,
            from,
            to,
        }))
    }
}
