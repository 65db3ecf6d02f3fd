//! Persistence layer: the append-only balance-update log.
//!
//! [`EventStore`] is the seam between the service layer and the durable
//! medium. Two backends implement it:
//!
//! - [`postgres::PostgresEventStore`]: `sqlx::PgPool` over the
//!   `balance_update_events` table (production).
//! - [`memory::InMemoryEventStore`]: a locked in-process log with a time
//!   index (tests and local development).
//!
//! Concurrency control belongs to the backend. Callers never lock around
//! store calls.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{EventRecord, NewEventRecord, RecordId, TimeRange};
use crate::error::StoreError;

pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;

/// Append-only storage for balance-update records.
///
/// Implementations guarantee:
///
/// - identifiers strictly increase in insertion order and are never reused;
/// - each append is atomic (a row is fully visible or not at all);
/// - readers never block writers and never see a partially written row.
#[async_trait]
pub trait EventStore: fmt::Debug + Send + Sync {
    /// Persists one record and returns it with its assigned identifier and
    /// resolved insert time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if the payload fails
    /// validation at write time, or [`StoreError::StorageUnavailable`] if
    /// the medium cannot be reached. On error no row was written.
    async fn append(&self, record: NewEventRecord) -> Result<EventRecord, StoreError>;

    /// Persists several records in one atomic unit. Identifiers ascend in
    /// input order. An empty batch writes nothing.
    ///
    /// # Errors
    ///
    /// Same as [`EventStore::append`]; on error none of the records was
    /// written.
    async fn append_batch(
        &self,
        records: Vec<NewEventRecord>,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Returns every record whose insert time falls in `range`, ordered by
    /// `(insert_time, id)` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] on medium failure. A
    /// failed query returns no records.
    async fn query_by_time_range(&self, range: &TimeRange)
    -> Result<Vec<EventRecord>, StoreError>;

    /// Point lookup by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such record exists, or
    /// [`StoreError::StorageUnavailable`] on medium failure.
    async fn get_by_id(&self, id: RecordId) -> Result<EventRecord, StoreError>;

    /// Cheap round-trip to the medium.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the medium does not
    /// answer.
    async fn ping(&self) -> Result<(), StoreError>;
}
