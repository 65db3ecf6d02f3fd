//! Fire-and-forget producer front end.
//!
//! [`EventRecorder`] hands records to a background worker over a bounded
//! channel. The worker groups whatever is queued into one atomic batch per
//! round trip to the store. Producers on a hot path (order book updates,
//! balance snapshots) never wait on the database.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::EventService;
use crate::domain::{NewEventRecord, RecordPayload};
use crate::error::StoreError;

/// Tuning knobs for [`EventRecorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Records that may wait in the queue before `record` starts failing.
    pub queue_capacity: usize,
    /// Upper bound on records per appended batch.
    pub max_batch_size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            max_batch_size: 256,
        }
    }
}

/// Counters returned by the worker when it shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Batches the worker attempted.
    pub batches: u64,
    /// Records durably appended.
    pub appended: u64,
    /// Records lost to failed batches.
    pub failed: u64,
}

/// Cloneable handle feeding the background append worker.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    sender: mpsc::Sender<NewEventRecord>,
}

impl EventRecorder {
    /// Spawns the worker on the current runtime.
    ///
    /// The worker runs until every handle clone is dropped, flushes what
    /// is still queued, then resolves the returned [`JoinHandle`] with its
    /// counters.
    #[must_use]
    pub fn start(service: EventService, config: RecorderConfig) -> (Self, JoinHandle<RecorderStats>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(run_worker(service, receiver, config.max_batch_size.max(1)));
        (Self { sender }, handle)
    }

    /// Queues a record without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if the record fails
    /// validation, and [`StoreError::StorageUnavailable`] if the queue is
    /// full or the worker has stopped.
    pub fn record(&self, record: NewEventRecord) -> Result<(), StoreError> {
        record.validate()?;
        self.sender.try_send(record).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                StoreError::StorageUnavailable("recorder queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                StoreError::StorageUnavailable("recorder worker has stopped".to_string())
            }
        })
    }

    /// Serializes a typed payload, tags it with its schema version and
    /// queues it.
    ///
    /// # Errors
    ///
    /// Same as [`EventRecorder::record`].
    pub fn save<P: RecordPayload + ?Sized>(&self, payload: &P) -> Result<(), StoreError> {
        self.record(NewEventRecord::from_payload(payload)?)
    }
}

async fn run_worker(
    service: EventService,
    mut receiver: mpsc::Receiver<NewEventRecord>,
    max_batch_size: usize,
) -> RecorderStats {
    let mut stats = RecorderStats::default();
    tracing::debug!(max_batch_size, "event recorder started");

    while let Some(first) = receiver.recv().await {
        let mut batch = Vec::with_capacity(max_batch_size.min(64));
        batch.push(first);
        while batch.len() < max_batch_size {
            match receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        let size = batch.len() as u64;
        stats.batches += 1;
        match service.append_batch(batch).await {
            Ok(ids) => stats.appended += ids.len() as u64,
            Err(err) => {
                stats.failed += size;
                tracing::error!(size, error = %err, "recorded batch was dropped");
            }
        }
    }

    tracing::info!(
        batches = stats.batches,
        appended = stats.appended,
        failed = stats.failed,
        "event recorder stopped"
    );
    stats
}
