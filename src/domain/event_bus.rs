//! Broadcast channel for freshly appended records.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every durable
//! append publishes the persisted [`EventRecord`] through the bus, and all
//! WebSocket connections subscribe to tail the log live.

use tokio::sync::broadcast;

use super::EventRecord;

/// Broadcast bus for appended [`EventRecord`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest records are
/// dropped for lagging receivers; the log itself is unaffected.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a record to all subscribers.
    ///
    /// Returns the number of receivers that received the record.
    /// If there are no active receivers, the record is silently dropped.
    pub fn publish(&self, record: EventRecord) -> usize {
        self.sender.send(record).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future records.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NewEventRecord, RecordId};
    use chrono::Utc;
    use serde_json::json;

    fn make_record(id: i64) -> EventRecord {
        let Ok(record) = NewEventRecord::new(json!({"asset": "BTC", "free": "1.5"})) else {
            panic!("valid payload");
        };
        record.into_persisted(RecordId::new(id), Utc::now())
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(make_record(1)), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_record() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(make_record(7));

        let Ok(record) = rx.recv().await else {
            panic!("expected to receive record");
        };
        assert_eq!(record.id(), RecordId::new(7));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_record() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(make_record(3)), 2);

        let Ok(r1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(r2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(r1, r2);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
