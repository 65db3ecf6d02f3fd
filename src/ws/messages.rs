//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::dto::EventRecordDto;
use crate::domain::EventRecord;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: Value,
}

impl WsMessage {
    /// Server push of a freshly appended record.
    #[must_use]
    pub fn record_appended(record: EventRecord) -> Self {
        let payload = serde_json::json!({
            "event_type": "record_appended",
            "record": EventRecordDto::from(record),
        });
        Self::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload)
    }

    /// Server push telling a live-tail client it fell behind the bus and
    /// `missed` records were skipped. The client can fetch them with
    /// `replay`.
    #[must_use]
    pub fn lagged(missed: u64) -> Self {
        let payload = serde_json::json!({
            "event_type": "lagged",
            "missed": missed,
        });
        Self::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload)
    }

    /// Reply to the command carrying `id`.
    #[must_use]
    pub fn response(id: String, payload: Value) -> Self {
        Self::new(id, WsMessageType::Response, payload)
    }

    /// Error reply to the command carrying `id`.
    #[must_use]
    pub fn error(id: String, code: u32, message: &str) -> Self {
        let payload = serde_json::json!({
            "code": code,
            "message": message,
        });
        Self::new(id, WsMessageType::Error, payload)
    }

    fn new(id: String, msg_type: WsMessageType, payload: Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Liveness probe.
    Ping,
    /// Fetch every record in an inclusive time window.
    Replay {
        /// Inclusive lower bound; omit for the start of the log.
        #[serde(default)]
        from: Option<DateTime<Utc>>,
        /// Inclusive upper bound; omit for the end of the log.
        #[serde(default)]
        to: Option<DateTime<Utc>>,
    },
}

impl WsCommand {
    /// Tags accepted in the `command` field.
    pub const NAMES: [&'static str; 2] = ["ping", "replay"];

    /// Returns `true` if `name` is a command this server understands.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        Self::NAMES.iter().any(|known| *known == name)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::RecordId;
    use serde_json::json;

    #[test]
    fn envelope_uses_type_key() {
        let msg = WsMessage::response("abc".to_string(), json!({"pong": true}));
        let Ok(value) = serde_json::to_value(&msg) else {
            panic!("serializable");
        };
        assert_eq!(value["type"], "response");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["payload"]["pong"], true);
    }

    #[test]
    fn appended_record_event_shape() {
        let record =
            EventRecord::from_parts(RecordId::new(7), Utc::now(), Some(1), json!({"asset": "BTC"}));
        let msg = WsMessage::record_appended(record);
        assert_eq!(msg.msg_type, WsMessageType::Event);
        assert_eq!(msg.payload["event_type"], "record_appended");
        assert_eq!(msg.payload["record"]["id"], 7);
        assert_eq!(msg.payload["record"]["payload"]["asset"], "BTC");
    }

    #[test]
    fn commands_parse() {
        let Ok(ping) = serde_json::from_value::<WsCommand>(json!({"command": "ping"})) else {
            panic!("ping should parse");
        };
        assert_eq!(ping, WsCommand::Ping);

        let Ok(replay) = serde_json::from_value::<WsCommand>(
            json!({"command": "replay", "from": "2024-01-01T00:00:00Z"}),
        ) else {
            panic!("replay should parse");
        };
        assert!(matches!(replay, WsCommand::Replay { from: Some(_), to: None }));
    }

    #[test]
    fn lagged_event_shape() {
        let msg = WsMessage::lagged(42);
        assert_eq!(msg.msg_type, WsMessageType::Event);
        assert_eq!(msg.payload["event_type"], "lagged");
        assert_eq!(msg.payload["missed"], 42);
    }

    #[test]
    fn known_command_names() {
        assert!(WsCommand::is_known("ping"));
        assert!(WsCommand::is_known("replay"));
        assert!(!WsCommand::is_known("swap"));
    }

    #[test]
    fn unknown_command_does_not_parse() {
        assert!(serde_json::from_value::<WsCommand>(json!({"command": "swap"})).is_err());
    }
}
