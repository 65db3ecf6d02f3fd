//! PostgreSQL implementation of the event store.
//!
//! Identifier assignment and insertion are delegated to a `BIGSERIAL`
//! column and a single `INSERT ... RETURNING` statement, so the medium's
//! own atomicity and read-committed isolation cover every guarantee of
//! [`EventStore`]. The schema lives in `migrations/`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::EventStore;
use crate::config::StoreConfig;
use crate::domain::{EventRecord, NewEventRecord, RecordId, TimeRange};
use crate::error::StoreError;

/// Raw `balance_update_events` row: `(id, insert_time, version, payload)`.
type EventRow = (i64, DateTime<Utc>, Option<i32>, serde_json::Value);

const INSERT_EVENT: &str = "INSERT INTO balance_update_events (insert_time, version, payload) \
     VALUES (COALESCE($1, now()), $2, $3) RETURNING id, insert_time";

const SELECT_BY_ID: &str =
    "SELECT id, insert_time, version, payload FROM balance_update_events WHERE id = $1";

const SELECT_BETWEEN: &str = "SELECT id, insert_time, version, payload FROM balance_update_events \
     WHERE insert_time >= $1 AND insert_time <= $2 ORDER BY insert_time ASC, id ASC";

const SELECT_SINCE: &str = "SELECT id, insert_time, version, payload FROM balance_update_events \
     WHERE insert_time >= $1 ORDER BY insert_time ASC, id ASC";

const SELECT_UNTIL: &str = "SELECT id, insert_time, version, payload FROM balance_update_events \
     WHERE insert_time <= $1 ORDER BY insert_time ASC, id ASC";

const SELECT_ALL: &str = "SELECT id, insert_time, version, payload FROM balance_update_events \
     ORDER BY insert_time ASC, id ASC";

/// PostgreSQL-backed event store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the database cannot be
    /// reached within the configured connect timeout.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    /// Applies the `balance_update_events` table definition.
    ///
    /// Safe to call on every start; already applied migrations are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the migration cannot
    /// be applied.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("migration failed: {e}")))?;
        tracing::info!("balance_update_events schema is up to date");
        Ok(())
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Converts a fetched row into a record.
fn row_to_record((id, insert_time, version, payload): EventRow) -> Result<EventRecord, StoreError> {
    let version = version
        .map(u16::try_from)
        .transpose()
        .map_err(|_| StoreError::Internal(format!("record {id} has an out-of-range version")))?;
    Ok(EventRecord::from_parts(
        RecordId::new(id),
        insert_time,
        version,
        payload,
    ))
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, record: NewEventRecord) -> Result<EventRecord, StoreError> {
        record.validate()?;

        let (id, insert_time) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(INSERT_EVENT)
            .bind(record.insert_time())
            .bind(record.version().map(i32::from))
            .bind(record.payload())
            .fetch_one(&self.pool)
            .await?;

        Ok(record.into_persisted(RecordId::new(id), insert_time))
    }

    async fn append_batch(
        &self,
        records: Vec<NewEventRecord>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in &records {
            record.validate()?;
        }

        // Dropping the transaction without commit rolls every insert back.
        let mut tx = self.pool.begin().await?;
        let mut persisted = Vec::with_capacity(records.len());
        for record in records {
            let (id, insert_time) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(INSERT_EVENT)
                .bind(record.insert_time())
                .bind(record.version().map(i32::from))
                .bind(record.payload())
                .fetch_one(&mut *tx)
                .await?;
            persisted.push(record.into_persisted(RecordId::new(id), insert_time));
        }
        tx.commit().await?;

        Ok(persisted)
    }

    async fn query_by_time_range(
        &self,
        range: &TimeRange,
    ) -> Result<Vec<EventRecord>, StoreError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = match (range.start(), range.end()) {
            (Some(from), Some(to)) => {
                sqlx::query_as::<_, EventRow>(SELECT_BETWEEN)
                    .bind(from)
                    .bind(to)
                    .fetch_all(&self.pool)
                    .await
            }
            (Some(from), None) => {
                sqlx::query_as::<_, EventRow>(SELECT_SINCE)
                    .bind(from)
                    .fetch_all(&self.pool)
                    .await
            }
            (None, Some(to)) => {
                sqlx::query_as::<_, EventRow>(SELECT_UNTIL)
                    .bind(to)
                    .fetch_all(&self.pool)
                    .await
            }
            (None, None) => {
                sqlx::query_as::<_, EventRow>(SELECT_ALL)
                    .fetch_all(&self.pool)
                    .await
            }
        }?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn get_by_id(&self, id: RecordId) -> Result<EventRecord, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(SELECT_BY_ID)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map_or(Err(StoreError::NotFound(id)), row_to_record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
