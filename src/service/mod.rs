//! Service layer: the producer and consumer entry points.
//!
//! [`EventService`] bounds every store call with a timeout and publishes
//! appended records through the [`super::domain::EventBus`].
//! [`EventRecorder`] queues records for batched background appends.

pub mod event_service;
pub mod recorder;

pub use event_service::EventService;
pub use recorder::{EventRecorder, RecorderConfig, RecorderStats};
