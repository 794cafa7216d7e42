//! Feature key naming.
//!
//! Every key that enters a [`FlatFrame`](crate::core::FlatFrame) is built here, so
//! the unpacker, the derived feature engine and the standardization step always
//! agree on spelling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Finger names indexed by the sensor's finger type.
pub const FINGERS: [&str; 5] = ["thumb", "index", "middle", "ring", "pinky"];

/// Key holding the index of the device a frame came from.
pub const DEVICE_INDEX: &str = "device_index";

/// Key holding the device mode (0 = desktop, 1 = head-mounted).
pub const DEVICE_MODE: &str = "device_mode";

/// Top-level frame rate attribute reported by the sensor.
pub const FRAME_RATE: &str = "currentFrameRate";

/// Column used for gesture labels in recordings.
pub const GESTURE: &str = "gesture";

/// Which hand a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Both hands in prefix order.
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }

    /// Parse the sensor's handedness tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "left" => Some(Hand::Left),
            "right" => Some(Hand::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a finger type, if it is one of the five known types.
pub fn finger_name(finger_type: usize) -> Option<&'static str> {
    FINGERS.get(finger_type).copied()
}

/// `{hand}_{attr}`
pub fn hand_key(hand: Hand, attr: &str) -> String {
    format!("{hand}_{attr}")
}

/// `{hand}_{finger}_{attr}`
pub fn finger_key(hand: Hand, finger: &str, attr: &str) -> String {
    format!("{hand}_{finger}_{attr}")
}

/// `{base}_{index}`
pub fn indexed(base: &str, index: usize) -> String {
    format!("{base}_{index}")
}

/// The three component keys of a 3D hand attribute.
pub fn hand_vector(hand: Hand, attr: &str) -> [String; 3] {
    let base = hand_key(hand, attr);
    [indexed(&base, 0), indexed(&base, 1), indexed(&base, 2)]
}

/// The three component keys of a fingertip position.
pub fn tip_vector(hand: Hand, finger: &str) -> [String; 3] {
    let base = finger_key(hand, finger, "tipPosition");
    [indexed(&base, 0), indexed(&base, 1), indexed(&base, 2)]
}

/// Whether a key is namespaced under the given hand.
pub fn belongs_to(key: &str, hand: Hand) -> bool {
    key.strip_prefix(hand.as_str())
        .map(|rest| rest.starts_with('_'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(hand_key(Hand::Left, "palmPosition"), "left_palmPosition");
        assert_eq!(
            finger_key(Hand::Right, "index", "extended"),
            "right_index_extended"
        );
        assert_eq!(
            tip_vector(Hand::Right, "index")[2],
            "right_index_tipPosition_2"
        );
        assert_eq!(hand_vector(Hand::Left, "palmNormal")[0], "left_palmNormal_0");
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("left_palmPosition_0", Hand::Left));
        assert!(!belongs_to("left_palmPosition_0", Hand::Right));
        assert!(!belongs_to("leftover", Hand::Left));
        assert!(!belongs_to("palm_distance", Hand::Left));
    }

    #[test]
    fn test_finger_lookup() {
        assert_eq!(finger_name(0), Some("thumb"));
        assert_eq!(finger_name(4), Some("pinky"));
        assert_eq!(finger_name(5), None);
    }
}
