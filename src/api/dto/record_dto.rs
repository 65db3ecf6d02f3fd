//! Event record DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{EventRecord, NewEventRecord, RecordId};
use crate::error::StoreError;

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AppendRecordRequest {
    /// Balance-update document as received from the venue.
    #[schema(value_type = Object)]
    pub payload: Value,
    /// Schema revision of `payload`.
    #[serde(default)]
    pub version: Option<u16>,
    /// Arrival time to record instead of the server clock.
    #[serde(default)]
    pub insert_time: Option<DateTime<Utc>>,
}

impl TryFrom<AppendRecordRequest> for NewEventRecord {
    type Error = StoreError;

    fn try_from(req: AppendRecordRequest) -> Result<Self, Self::Error> {
        let mut record = Self::new(req.payload)?;
        if let Some(version) = req.version {
            record = record.with_version(version);
        }
        if let Some(insert_time) = req.insert_time {
            record = record.with_insert_time(insert_time);
        }
        Ok(record)
    }
}

/// Response body for `POST /events`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppendRecordResponse {
    /// Identifier assigned by the store.
    #[schema(value_type = i64)]
    pub id: RecordId,
}

/// Request body for `POST /events/batch`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchAppendRequest {
    /// Records to append in one atomic unit.
    pub records: Vec<AppendRecordRequest>,
}

/// Response body for `POST /events/batch`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchAppendResponse {
    /// Assigned identifiers, in request order.
    #[schema(value_type = Vec<i64>)]
    pub ids: Vec<RecordId>,
}

/// A persisted record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventRecordDto {
    /// Store-assigned identifier.
    pub id: i64,
    /// Time the store accepted the record.
    pub insert_time: DateTime<Utc>,
    /// Schema revision, if the producer set one.
    pub version: Option<u16>,
    /// Stored document, byte-for-byte as appended.
    #[schema(value_type = Object)]
    pub payload: Value,
}

impl From<EventRecord> for EventRecordDto {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id().get(),
            insert_time: record.insert_time(),
            version: record.version(),
            payload: record.into_payload(),
        }
    }
}

/// Query parameters for `GET /events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimeRangeParams {
    /// Inclusive lower bound (RFC 3339). Omit for the start of the log.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339). Omit for the end of the log.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Response body for `GET /events`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordListResponse {
    /// Matching records ordered by `(insert_time, id)`.
    pub data: Vec<EventRecordDto>,
    /// Number of records in `data`.
    pub count: usize,
}

impl From<Vec<EventRecord>> for RecordListResponse {
    fn from(records: Vec<EventRecord>) -> Self {
        let data: Vec<EventRecordDto> = records.into_iter().map(EventRecordDto::from).collect();
        Self {
            count: data.len(),
            data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_converts_with_version() {
        let req = AppendRecordRequest {
            payload: json!({"asset": "BTC", "free": "0.1"}),
            version: Some(2),
            insert_time: None,
        };
        let Ok(record) = NewEventRecord::try_from(req) else {
            panic!("valid request");
        };
        assert_eq!(record.version(), Some(2));
    }

    #[test]
    fn request_with_null_payload_is_rejected() {
        let req = AppendRecordRequest {
            payload: Value::Null,
            version: None,
            insert_time: None,
        };
        assert!(matches!(
            NewEventRecord::try_from(req),
            Err(StoreError::InvalidPayload(_))
        ));
    }

    #[test]
    fn missing_version_deserializes_as_none() {
        let Ok(req) = serde_json::from_str::<AppendRecordRequest>(r#"{"payload":{"asset":"ETH"}}"#)
        else {
            panic!("should parse");
        };
        assert!(req.version.is_none());
        assert!(req.insert_time.is_none());
    }

    #[test]
    fn list_response_counts_records() {
        let now = Utc::now();
        let records = vec![
            EventRecord::from_parts(RecordId::new(1), now, None, json!({"a": 1})),
            EventRecord::from_parts(RecordId::new(2), now, Some(1), json!({"a": 2})),
        ];
        let response = RecordListResponse::from(records);
        assert_eq!(response.count, 2);
        let ids: Vec<i64> = response.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
