//! Balance-update event records.
//!
//! A record exists in two states, modelled as two types:
//!
//! - [`NewEventRecord`]: validated, unpersisted, no identifier yet.
//! - [`EventRecord`]: persisted, carries the store-assigned [`RecordId`].
//!
//! The transition is one-way and performed only by an
//! [`crate::persistence::EventStore`].

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Store-assigned identifier of a persisted record.
///
/// Strictly increasing in insertion order and never reused. Gaps are
/// allowed (a rolled-back insert still consumes its value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Typed producer payloads.
///
/// A producer that emits its own balance-update struct implements this
/// trait so the struct's schema revision travels with it into the store.
pub trait RecordPayload: Serialize {
    /// Schema revision the serialized body conforms to. `None` for
    /// unversioned payloads.
    fn schema_version(&self) -> Option<u16> {
        None
    }
}

/// A validated record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEventRecord {
    payload: Value,
    version: Option<u16>,
    insert_time: Option<DateTime<Utc>>,
}

impl NewEventRecord {
    /// Builds a record from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if the payload is null, a
    /// scalar, an empty object or array, or contains a NUL character.
    pub fn new(payload: Value) -> Result<Self, StoreError> {
        validate_payload(&payload)?;
        Ok(Self {
            payload,
            version: None,
            insert_time: None,
        })
    }

    /// Parses a record payload from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if the text is not valid JSON
    /// or the parsed document fails [`NewEventRecord::new`] validation.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let payload: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidPayload(format!("malformed JSON: {e}")))?;
        Self::new(payload)
    }

    /// Serializes any value into a record payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if serialization fails or the
    /// resulting document fails validation.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, StoreError> {
        let payload = serde_json::to_value(value)
            .map_err(|e| StoreError::InvalidPayload(format!("not serializable: {e}")))?;
        Self::new(payload)
    }

    /// Serializes a typed payload, copying its schema revision onto the
    /// record.
    ///
    /// # Errors
    ///
    /// Same as [`NewEventRecord::from_serializable`].
    pub fn from_payload<P: RecordPayload + ?Sized>(payload: &P) -> Result<Self, StoreError> {
        let mut record = Self::from_serializable(payload)?;
        record.version = payload.schema_version();
        Ok(record)
    }

    /// Tags the record with a payload schema revision.
    #[must_use]
    pub fn with_version(mut self, version: u16) -> Self {
        self.version = Some(version);
        self
    }

    /// Pins the insert time instead of letting the store use "now".
    ///
    /// Truncated to microseconds, the precision of the durable medium.
    #[must_use]
    pub fn with_insert_time(mut self, insert_time: DateTime<Utc>) -> Self {
        self.insert_time = Some(insert_time.trunc_subsecs(6));
        self
    }

    /// Returns the payload document.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the payload schema revision, if any.
    #[must_use]
    pub const fn version(&self) -> Option<u16> {
        self.version
    }

    /// Returns the caller-supplied insert time, if any.
    #[must_use]
    pub const fn insert_time(&self) -> Option<DateTime<Utc>> {
        self.insert_time
    }

    /// Re-runs payload validation.
    ///
    /// Stores call this before writing so a record built around the
    /// constructors is still rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] on validation failure.
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_payload(&self.payload)
    }

    /// Skips validation so store-side checks can be exercised.
    #[cfg(test)]
    pub(crate) const fn unchecked(payload: Value) -> Self {
        Self {
            payload,
            version: None,
            insert_time: None,
        }
    }

    /// Turns the record into its persisted form.
    pub(crate) fn into_persisted(self, id: RecordId, insert_time: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id,
            insert_time,
            version: self.version,
            payload: self.payload,
        }
    }
}

/// A persisted, immutable balance-update record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    id: RecordId,
    insert_time: DateTime<Utc>,
    version: Option<u16>,
    payload: Value,
}

impl EventRecord {
    /// Reassembles a record read back from the medium.
    pub(crate) const fn from_parts(
        id: RecordId,
        insert_time: DateTime<Utc>,
        version: Option<u16>,
        payload: Value,
    ) -> Self {
        Self {
            id,
            insert_time,
            version,
            payload,
        }
    }

    /// Store-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Arrival timestamp.
    #[must_use]
    pub const fn insert_time(&self) -> DateTime<Utc> {
        self.insert_time
    }

    /// Payload schema revision; `None` for legacy payloads.
    #[must_use]
    pub const fn version(&self) -> Option<u16> {
        self.version
    }

    /// Raw payload document, exactly as appended.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the record and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// Checks that a payload is a non-empty structured document the medium can
/// store.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPayload`] describing the first violation.
pub fn validate_payload(payload: &Value) -> Result<(), StoreError> {
    match payload {
        Value::Null => {
            return Err(StoreError::InvalidPayload(
                "payload must not be null".to_string(),
            ));
        }
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            return Err(StoreError::InvalidPayload(
                "payload must be a JSON object or array".to_string(),
            ));
        }
        Value::Object(map) if map.is_empty() => {
            return Err(StoreError::InvalidPayload(
                "payload must not be an empty object".to_string(),
            ));
        }
        Value::Array(items) if items.is_empty() => {
            return Err(StoreError::InvalidPayload(
                "payload must not be an empty array".to_string(),
            ));
        }
        Value::Object(_) | Value::Array(_) => {}
    }

    // JSONB rejects U+0000 anywhere in text; walk without recursion so deep
    // documents cannot overflow the stack.
    let mut pending = vec![payload];
    while let Some(value) = pending.pop() {
        match value {
            Value::String(s) if s.contains('\0') => {
                return Err(StoreError::InvalidPayload(
                    "payload contains a NUL character".to_string(),
                ));
            }
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => {
                if map.keys().any(|k| k.contains('\0')) {
                    return Err(StoreError::InvalidPayload(
                        "payload contains a NUL character".to_string(),
                    ));
                }
                pending.extend(map.values());
            }
            _ => {}
        }
    }

    Ok(())
}
