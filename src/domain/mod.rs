//! Domain layer: the event record model and the append notification bus.
//!
//! This module defines what a balance-update record is (identity, payload
//! rules, schema version), the time windows records are queried by, and
//! the broadcast bus that fans appended records out to live subscribers.

pub mod event_bus;
pub mod record;
pub mod time_range;

pub use event_bus::EventBus;
pub use record::{EventRecord, NewEventRecord, RecordId, RecordPayload, validate_payload};
pub use time_range::TimeRange;
