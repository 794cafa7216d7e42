//! Flattening of raw sensor frames into named scalars.
//!
//! Hands emit `{hand}_{attr}[_{i}]`, fingers emit `{hand}_{finger}_{attr}[_{i}]`.
//! Nested lists are flattened fully in row-major order, so a 3x3 arm basis becomes
//! nine keys and a finger's 4x3x3 bone bases become thirty-six.

use crate::config::DeviceMode;
use crate::core::frame::FlatFrame;
use crate::core::keys::{self, Hand};
use crate::sensor::types::{RawFinger, RawFrame};
use serde_json::{Map, Value};
use tracing::trace;

/// Per-device information stamped onto each unpacked frame.
#[derive(Debug, Clone, Copy)]
pub struct UnpackContext {
    /// Position of the device in the configuration
    pub device_index: usize,
    /// Desktop or head-mounted
    pub mode: DeviceMode,
    /// Only every `frame_stride`th frame is processed
    pub frame_stride: u32,
}

impl Default for UnpackContext {
    fn default() -> Self {
        Self {
            device_index: 0,
            mode: DeviceMode::Desktop,
            frame_stride: 1,
        }
    }
}

/// Unpack a raw frame. Returns `None` when the frame reports no hands.
pub fn unpack_frame(raw: &RawFrame, ctx: &UnpackContext) -> Option<FlatFrame> {
    if !raw.has_hands() {
        return None;
    }

    let mut flat = FlatFrame::new();

    for (key, value) in &raw.attributes {
        if let Some(number) = value.as_f64() {
            flat.insert(key.clone(), number);
        }
    }
    if let Some(rate) = flat.get(keys::FRAME_RATE) {
        flat.insert(keys::FRAME_RATE, rate / f64::from(ctx.frame_stride.max(1)));
    }
    flat.insert(keys::DEVICE_INDEX, ctx.device_index as f64);
    flat.insert(keys::DEVICE_MODE, ctx.mode.code());

    let mut left_id = None;
    let mut right_id = None;
    for hand in &raw.hands {
        let Some(side) = Hand::from_tag(&hand.handedness) else {
            trace!(tag = %hand.handedness, "ignoring hand with unknown handedness");
            continue;
        };
        match side {
            Hand::Left => left_id = hand.id(),
            Hand::Right => right_id = hand.id(),
        }
        flat.mark_present(side);
        flatten_attributes(&mut flat, &keys::hand_key(side, ""), &hand.attributes);
    }

    for finger in &raw.pointables {
        unpack_finger(&mut flat, finger, left_id, right_id);
    }

    Some(flat)
}

fn unpack_finger(
    flat: &mut FlatFrame,
    finger: &RawFinger,
    left_id: Option<i64>,
    right_id: Option<i64>,
) {
    let side = match finger.hand_id {
        Some(id) if Some(id) == left_id => Hand::Left,
        Some(id) if Some(id) == right_id => Hand::Right,
        _ => {
            trace!(hand_id = ?finger.hand_id, "dropping finger with unmatched hand id");
            return;
        }
    };
    let Some(name) = finger.finger_type.and_then(keys::finger_name) else {
        trace!(finger_type = ?finger.finger_type, "dropping finger with unknown type");
        return;
    };

    if let Some(id) = finger.hand_id {
        flat.insert(keys::finger_key(side, name, "handId"), id as f64);
    }
    flatten_attributes(flat, &keys::finger_key(side, name, ""), &finger.attributes);
}

/// Emit one key per scalar under `prefix`, which already ends in `_`.
fn flatten_attributes(flat: &mut FlatFrame, prefix: &str, attributes: &Map<String, Value>) {
    for (attr, value) in attributes {
        flatten_value(flat, format!("{prefix}{attr}"), value);
    }
}

fn flatten_value(flat: &mut FlatFrame, key: String, value: &Value) {
    match value {
        Value::Array(_) => {
            let mut scalars = Vec::new();
            collect_scalars(value, &mut scalars);
            for (index, scalar) in scalars.into_iter().enumerate() {
                flat.insert(keys::indexed(&key, index), scalar);
            }
        }
        other => {
            if let Some(scalar) = scalar_of(other) {
                flat.insert(key, scalar);
            }
        }
    }
}

fn collect_scalars(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_scalars(item, out);
            }
        }
        other => {
            if let Some(scalar) = scalar_of(other) {
                out.push(scalar);
            }
        }
    }
}

fn scalar_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
