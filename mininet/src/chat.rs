//! The application payload carried by chat segments.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat message as the application layer sees it.
///
/// The stack itself treats payloads as opaque JSON; this type is the
/// application-side view of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

impl ChatPayload {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "CHAT".to_owned(),
            sender: sender.into(),
            message: message.into(),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// The line the server prints for a delivered message, timestamp
    /// trimmed to the seconds.
    pub fn display_line(&self) -> String {
        let timestamp = self.timestamp.get(..19).unwrap_or(&self.timestamp);
        format!("[{}] {}: {}", timestamp, self.sender, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let payload = ChatPayload::new("ana", "bom dia");
        let value = payload.to_value();
        assert_eq!(ChatPayload::from_value(&value), Some(payload));
    }

    #[test]
    fn display_line_trims_the_timestamp() {
        let mut payload = ChatPayload::new("ana", "oi");
        payload.timestamp = "2024-05-01T10:20:30.123456-03:00".to_owned();
        assert_eq!(payload.display_line(), "[2024-05-01T10:20:30] ana: oi");
    }

    #[test]
    fn unrecognized_payloads_are_not_chat() {
        assert_eq!(ChatPayload::from_value(&serde_json::json!(42)), None);
    }
}
