//! # balance-event-store
//!
//! Append-only event store for exchange balance-update records.
//!
//! Every balance update received from a trading venue's account feed is
//! appended once, tagged with the time the store accepted it and an
//! optional schema version, and never modified afterwards. Consumers read
//! the history back by inclusive time window, ordered by insert time and
//! then by identifier, or tail it live over WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! Producers / Consumers (HTTP, WebSocket, in-process)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     ├── EventRecorder (service/)
//!     │
//!     ├── EventService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── EventStore trait (persistence/)
//!     │     ├── PostgresEventStore
//!     │     └── InMemoryEventStore
//!     │
//!     └── PostgreSQL `balance_update_events`
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use balance_event_store::domain::{EventBus, NewEventRecord};
//! use balance_event_store::persistence::InMemoryEventStore;
//! use balance_event_store::service::EventService;
//!
//! # async fn run() -> Result<(), balance_event_store::error::StoreError> {
//! let service = EventService::new(
//!     Arc::new(InMemoryEventStore::new()),
//!     EventBus::new(1024),
//!     Duration::from_secs(5),
//! );
//! let record = NewEventRecord::from_json_str(r#"{"asset":"BTC","free":"0.5"}"#)?;
//! let id = service.append(record.with_version(1)).await?;
//! let history = service.query_by_time_range(None, None).await?;
//! assert_eq!(history.first().map(|r| r.id()), Some(id));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
