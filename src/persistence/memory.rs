//! In-process implementation of the event store.
//!
//! Keeps the log in a `Vec` indexed by identifier plus a `BTreeSet`
//! acting as the `(insert_time, id)` secondary index. A single
//! [`tokio::sync::RwLock`] guards both, so identifier assignment and
//! insertion happen in one critical section. Records are shared as
//! `Arc`s: readers hold the lock only long enough to collect handles and
//! copy the records out after releasing it.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;

use super::EventStore;
use crate::domain::{EventRecord, NewEventRecord, RecordId, TimeRange};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryLog {
    /// `records[n]` holds the record with identifier `n + 1`.
    records: Vec<Arc<EventRecord>>,
    time_index: BTreeSet<(DateTime<Utc>, RecordId)>,
}

impl MemoryLog {
    fn push(&mut self, record: NewEventRecord) -> EventRecord {
        let id = RecordId::new(self.records.len() as i64 + 1);

        let insert_time = record
            .insert_time()
            .unwrap_or_else(|| Utc::now().trunc_subsecs(6));
        let persisted = record.into_persisted(id, insert_time);

        self.time_index.insert((insert_time, id));
        self.records.push(Arc::new(persisted.clone()));
        persisted
    }

    fn get(&self, id: RecordId) -> Option<&Arc<EventRecord>> {
        let index = usize::try_from(id.get().checked_sub(1)?).ok()?;
        self.records.get(index)
    }

    fn matching(&self, range: &TimeRange) -> Result<Vec<Arc<EventRecord>>, StoreError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let lower = range
            .start()
            .map_or(Bound::Unbounded, |from| Bound::Included((from, RecordId::new(i64::MIN))));
        let upper = range
            .end()
            .map_or(Bound::Unbounded, |to| Bound::Included((to, RecordId::new(i64::MAX))));

        self.time_index
            .range((lower, upper))
            .map(|(_, id)| {
                self.get(*id)
                    .map(Arc::clone)
                    .ok_or_else(|| StoreError::Internal(format!("time index points at missing record {id}")))
            })
            .collect()
    }
}

/// Event store held entirely in memory.
///
/// Identifiers start at 1. Nothing survives a restart.
///
/// # Concurrency
///
/// - Appends take the write lock; concurrent appends are serialized and
///   each receives a distinct, strictly larger identifier.
/// - Queries take the read lock only to collect shared handles to the
///   matching records, so a large result never holds appends back while
///   it is copied.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<MemoryLog>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.log.read().await.records.len()
    }

    /// Returns `true` if nothing has been appended.
    pub async fn is_empty(&self) -> bool {
        self.log.read().await.records.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, record: NewEventRecord) -> Result<EventRecord, StoreError> {
        record.validate()?;
        let mut log = self.log.write().await;
        Ok(log.push(record))
    }

    async fn append_batch(
        &self,
        records: Vec<NewEventRecord>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        // Validate everything before touching the log so a bad record
        // leaves no partial batch behind.
        for record in &records {
            record.validate()?;
        }
        let mut log = self.log.write().await;
        Ok(records.into_iter().map(|r| log.push(r)).collect())
    }

    async fn query_by_time_range(
        &self,
        range: &TimeRange,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let matching = self.log.read().await.matching(range)?;
        Ok(matching.iter().map(|record| EventRecord::clone(record)).collect())
    }

    async fn get_by_id(&self, id: RecordId) -> Result<EventRecord, StoreError> {
        let record = self.log.read().await.get(id).map(Arc::clone);
        record
            .map(|record| EventRecord::clone(&record))
            .ok_or(StoreError::NotFound(id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::Duration;
    use serde_json::{Value, json};

    fn balance(asset: &str, free: &str) -> NewEventRecord {
        let Ok(record) = NewEventRecord::new(json!({"asset": asset, "free": free})) else {
            panic!("valid payload");
        };
        record
    }

    fn base_time() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    #[tokio::test]
    async fn append_then_get_round_trips() {
        let store = InMemoryEventStore::new();
        let before = Utc::now().trunc_subsecs(6);

        let Ok(appended) = store.append(balance("BTC", "1.5")).await else {
            panic!("append failed");
        };
        assert_eq!(appended.id(), RecordId::new(1));

        let Ok(fetched) = store.get_by_id(appended.id()).await else {
            panic!("get failed");
        };
        assert_eq!(fetched.version(), None);
        assert_eq!(fetched.payload(), &json!({"asset": "BTC", "free": "1.5"}));
        assert!(fetched.insert_time() >= before);
        assert!(fetched.insert_time() <= Utc::now());
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let store = InMemoryEventStore::new();
        let Ok(appended) = store.append(balance("ETH", "2").with_version(1)).await else {
            panic!("append failed");
        };

        let first = store.get_by_id(appended.id()).await.ok();
        let second = store.get_by_id(appended.id()).await.ok();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryEventStore::new();
        let result = store.get_by_id(RecordId::new(9999)).await;
        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == RecordId::new(9999)));
    }

    #[tokio::test]
    async fn range_query_returns_inclusive_window_in_order() {
        let store = InMemoryEventStore::new();
        let t1 = base_time();
        let t2 = t1 + Duration::seconds(1);
        let t3 = t1 + Duration::seconds(2);

        for (asset, t) in [("A", t1), ("B", t2), ("C", t3)] {
            let Ok(_) = store.append(balance(asset, "1").with_insert_time(t)).await else {
                panic!("append failed");
            };
        }

        let Ok(range) = TimeRange::between(t1, t2) else {
            panic!("valid range");
        };
        let Ok(records) = store.query_by_time_range(&range).await else {
            panic!("query failed");
        };
        let assets: Vec<&Value> = records.iter().map(|r| &r.payload()["asset"]).collect();
        assert_eq!(assets, vec![&json!("A"), &json!("B")]);
    }

    #[tokio::test]
    async fn range_query_orders_by_time_then_id() {
        let store = InMemoryEventStore::new();
        let t1 = base_time();
        let t0 = t1 - Duration::seconds(5);

        // Appended out of time order, with a burst sharing one timestamp.
        for (asset, t) in [("late-1", t1), ("early", t0), ("late-2", t1)] {
            let Ok(_) = store.append(balance(asset, "1").with_insert_time(t)).await else {
                panic!("append failed");
            };
        }

        let Ok(records) = store.query_by_time_range(&TimeRange::unbounded()).await else {
            panic!("query failed");
        };
        let assets: Vec<&Value> = records.iter().map(|r| &r.payload()["asset"]).collect();
        assert_eq!(assets, vec![&json!("early"), &json!("late-1"), &json!("late-2")]);
        assert!(records[1].id() < records[2].id());
    }

    #[tokio::test]
    async fn empty_window_is_not_an_error() {
        let store = InMemoryEventStore::new();
        let t = base_time();
        let Ok(_) = store.append(balance("BTC", "1").with_insert_time(t)).await else {
            panic!("append failed");
        };

        let Ok(range) = TimeRange::between(t + Duration::hours(1), t + Duration::hours(2)) else {
            panic!("valid range");
        };
        let Ok(records) = store.query_by_time_range(&range).await else {
            panic!("query failed");
        };
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn open_ended_ranges() {
        let store = InMemoryEventStore::new();
        let t = base_time();
        for offset in [-10, 0, 10] {
            let record = balance("BTC", "1").with_insert_time(t + Duration::seconds(offset));
            let Ok(_) = store.append(record).await else {
                panic!("append failed");
            };
        }

        let Ok(since) = store.query_by_time_range(&TimeRange::since(t)).await else {
            panic!("query failed");
        };
        assert_eq!(since.len(), 2);

        let Ok(until) = store.query_by_time_range(&TimeRange::until(t)).await else {
            panic!("query failed");
        };
        assert_eq!(until.len(), 2);
    }

    #[tokio::test]
    async fn sub_microsecond_lower_bound_excludes_earlier_record() {
        let store = InMemoryEventStore::new();
        let t = base_time();
        let Ok(_) = store.append(balance("BTC", "1").with_insert_time(t)).await else {
            panic!("append failed");
        };

        let Ok(range) = TimeRange::between(
            t + Duration::nanoseconds(500),
            t + Duration::seconds(1),
        ) else {
            panic!("valid range");
        };
        let Ok(records) = store.query_by_time_range(&range).await else {
            panic!("query failed");
        };
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn sub_microsecond_window_returns_nothing() {
        let store = InMemoryEventStore::new();
        let t = base_time();
        let Ok(_) = store.append(balance("BTC", "1").with_insert_time(t)).await else {
            panic!("append failed");
        };

        let Ok(range) = TimeRange::between(
            t + Duration::nanoseconds(100),
            t + Duration::nanoseconds(900),
        ) else {
            panic!("valid range");
        };
        let Ok(records) = store.query_by_time_range(&range).await else {
            panic!("query failed");
        };
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn invalid_record_rejects_whole_batch() {
        let store = InMemoryEventStore::new();
        let result = store
            .append_batch(vec![
                balance("A", "1"),
                NewEventRecord::unchecked(Value::Null),
                balance("B", "2"),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::InvalidPayload(_))));
        assert!(store.is_empty().await);

        let Ok(appended) = store.append(balance("C", "3")).await else {
            panic!("append failed");
        };
        assert_eq!(appended.id(), RecordId::new(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn appends_are_not_held_back_by_large_queries() {
        let store = Arc::new(InMemoryEventStore::new());
        let padding = "x".repeat(512);
        let records: Vec<NewEventRecord> = (0..50_000)
            .map(|n| {
                let Ok(record) = NewEventRecord::new(json!({"seq": n, "padding": padding})) else {
                    panic!("valid payload");
                };
                record
            })
            .collect();
        let Ok(_) = store.append_batch(records).await else {
            panic!("seed failed");
        };

        let reader = Arc::clone(&store);
        let query = tokio::spawn(async move {
            let started = std::time::Instant::now();
            let Ok(records) = reader.query_by_time_range(&TimeRange::unbounded()).await else {
                panic!("query failed");
            };
            (records.len(), started.elapsed())
        });
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        let started = std::time::Instant::now();
        let Ok(_) = store.append(balance("BTC", "1")).await else {
            panic!("append failed");
        };
        let append_time = started.elapsed();

        let Ok((count, query_time)) = query.await else {
            panic!("query task panicked");
        };
        assert!(count >= 50_000);
        assert!(
            append_time < query_time,
            "append took {append_time:?} while the query took {query_time:?}"
        );
    }

    #[tokio::test]
    async fn batch_gets_consecutive_ids_and_empty_batch_is_noop() {
        let store = InMemoryEventStore::new();
        let Ok(ok_batch) = store
            .append_batch(vec![balance("A", "1"), balance("B", "2")])
            .await
        else {
            panic!("batch failed");
        };
        assert_eq!(
            ok_batch.iter().map(EventRecord::id).collect::<Vec<_>>(),
            vec![RecordId::new(1), RecordId::new(2)]
        );

        assert!(store.append_batch(Vec::new()).await.is_ok());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_appends_get_unique_increasing_ids() {
        let store = Arc::new(InMemoryEventStore::new());
        let mut handles = Vec::new();

        for caller in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for n in 0..10 {
                    let record = balance(&format!("ASSET{caller}"), &n.to_string());
                    let Ok(appended) = store.append(record).await else {
                        panic!("append failed");
                    };
                    ids.push(appended.id());
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            let Ok(ids) = handle.await else {
                panic!("task panicked");
            };
            // Each caller observes its own ids strictly increasing.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            all.extend(ids);
        }

        let unique: HashSet<RecordId> = all.iter().copied().collect();
        assert_eq!(unique.len(), 100);
        assert_eq!(all.iter().max(), Some(&RecordId::new(100)));

        let Ok(records) = store.query_by_time_range(&TimeRange::unbounded()).await else {
            panic!("query failed");
        };
        assert_eq!(records.len(), 100);
        assert!(records.iter().all(|r| !r.payload().is_null()));
    }
}
