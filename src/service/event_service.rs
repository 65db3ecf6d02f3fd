//! Event service: bounds store calls, logs them and fans appends out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{EventBus, EventRecord, NewEventRecord, RecordId, TimeRange};
use crate::error::StoreError;
use crate::persistence::EventStore;

/// Entry point for producers and consumers.
///
/// Stateless coordinator: owns the storage backend and the [`EventBus`].
/// Every method follows the pattern: validate → call the store under a
/// timeout → publish (appends only) → return result.
#[derive(Debug, Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    event_bus: EventBus,
    operation_timeout: Duration,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, event_bus: EventBus, operation_timeout: Duration) -> Self {
        Self {
            store,
            event_bus,
            operation_timeout,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the storage backend.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Appends one balance-update record.
    ///
    /// The record is published on the bus only after the write is durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] for a malformed payload and
    /// [`StoreError::StorageUnavailable`] if the medium fails or does not
    /// answer within the operation timeout.
    pub async fn append(&self, record: NewEventRecord) -> Result<RecordId, StoreError> {
        record.validate()?;
        let version = record.version();

        let persisted = self.bounded("append", self.store.append(record)).await?;
        let id = persisted.id();

        tracing::info!(%id, ?version, insert_time = %persisted.insert_time(), "balance update appended");
        let _ = self.event_bus.publish(persisted);
        Ok(id)
    }

    /// Appends several records atomically.
    ///
    /// # Errors
    ///
    /// Same as [`EventService::append`]; on error none of the records was
    /// written.
    pub async fn append_batch(
        &self,
        records: Vec<NewEventRecord>,
    ) -> Result<Vec<RecordId>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let count = records.len();

        let persisted = self
            .bounded("append_batch", self.store.append_batch(records))
            .await?;

        let ids: Vec<RecordId> = persisted.iter().map(EventRecord::id).collect();
        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            tracing::info!(count, %first, %last, "balance update batch appended");
        }
        for record in persisted {
            let _ = self.event_bus.publish(record);
        }
        Ok(ids)
    }

    /// Looks up a record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown identifier and
    /// [`StoreError::StorageUnavailable`] on medium failure or timeout.
    pub async fn get_by_id(&self, id: RecordId) -> Result<EventRecord, StoreError> {
        let record = self.bounded("get_by_id", self.store.get_by_id(id)).await?;
        tracing::debug!(%id, "record fetched");
        Ok(record)
    }

    /// Returns every record with `insert_time` in `[from, to]`, ordered by
    /// `(insert_time, id)`. Either bound may be omitted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRange`] if `from > to` and
    /// [`StoreError::StorageUnavailable`] on medium failure or timeout.
    pub async fn query_by_time_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let range = TimeRange::new(from, to)?;
        let records = self
            .bounded("query_by_time_range", self.store.query_by_time_range(&range))
            .await?;
        tracing::debug!(?from, ?to, count = records.len(), "time range queried");
        Ok(records)
    }

    /// Checks that the medium answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if it does not.
    pub async fn health(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.store.ping()).await
    }

    /// Runs a store call under the operation timeout.
    ///
    /// On timeout the call's future is dropped; an append may or may not
    /// have committed, but never partially.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_transient() {
                    tracing::warn!(operation, error = %err, "store operation failed");
                } else {
                    tracing::debug!(operation, error = %err, "store operation rejected");
                }
                Err(err)
            }
            Err(_) => {
                let timeout_ms = self.operation_timeout.as_millis();
                tracing::warn!(operation, timeout_ms, "store operation timed out");
                Err(StoreError::StorageUnavailable(format!(
                    "{operation} timed out after {timeout_ms} ms"
                )))
            }
        }
    }
}
