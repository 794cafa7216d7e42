//! Message types produced by the sensor transport.
//!
//! Raw frames keep every attribute the sensor sends. Only the handful of fields
//! the unpacker needs to route data (handedness, finger type, owning hand) are
//! typed; everything else stays a JSON value until it is flattened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// One sensor record for a single time instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFrame {
    /// Zero, one or two tracked hands
    #[serde(default)]
    pub hands: Vec<RawHand>,
    /// Fingers of all hands, in flat order
    #[serde(default)]
    pub pointables: Vec<RawFinger>,
    /// Every other top-level attribute (frame rate, id, timestamp, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawFrame {
    /// Parse a frame from the JSON text of a sensor message.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn has_hands(&self) -> bool {
        !self.hands.is_empty()
    }
}

/// A tracked hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHand {
    /// Handedness tag, "left" or "right"
    #[serde(rename = "type")]
    pub handedness: String,
    /// Palm, arm and wrist attributes, including the hand `id`
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawHand {
    /// The id fingers use to refer to this hand.
    pub fn id(&self) -> Option<i64> {
        self.attributes.get("id").and_then(Value::as_i64)
    }
}

/// A finger (pointable) record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinger {
    /// Finger type, 0 = thumb .. 4 = pinky
    #[serde(rename = "type", default)]
    pub finger_type: Option<usize>,
    /// Id of the owning hand
    #[serde(rename = "handId", default)]
    pub hand_id: Option<i64>,
    /// Tip position, extension flag, bases, ...
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Connection state of a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// Attempting to open the connection
    Connecting { attempt: u32 },
    /// Connected; carries the handshake message if the service sent one
    Online { handshake: Option<String> },
    /// Connection lost; a retry is scheduled when `retry_in` is set
    Offline {
        reason: String,
        retry_in: Option<Duration>,
    },
}

/// Everything the transport hands to the tick loop.
#[derive(Debug, Clone)]
pub enum SensorMessage {
    /// A parsed frame from device `device`
    Frame {
        device: usize,
        frame: RawFrame,
        received_at: DateTime<Utc>,
    },
    /// A connection lifecycle text message (contains "event")
    Lifecycle { device: usize, text: String },
    /// The device's connection state changed
    Status { device: usize, status: DeviceStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_keeps_unknown_attributes() {
        let text = r#"{
            "currentFrameRate": 110.5,
            "id": 42,
            "hands": [{"type": "left", "id": 7, "palmPosition": [1, 2, 3]}],
            "pointables": [{"type": 1, "handId": 7, "extended": true}]
        }"#;

        let frame = RawFrame::from_json(text).unwrap();
        assert!(frame.has_hands());
        assert_eq!(frame.hands[0].handedness, "left");
        assert_eq!(frame.hands[0].id(), Some(7));
        assert_eq!(frame.pointables[0].finger_type, Some(1));
        assert_eq!(frame.pointables[0].hand_id, Some(7));
        assert!(frame.attributes.contains_key("currentFrameRate"));
        assert!(!frame.attributes.contains_key("hands"));
    }

    #[test]
    fn test_frame_without_hands() {
        let frame = RawFrame::from_json(r#"{"currentFrameRate": 60}"#).unwrap();
        assert!(!frame.has_hands());
        assert!(frame.pointables.is_empty());
    }
}
