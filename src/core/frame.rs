//! The flat frame that travels through the pipeline after unpacking.

use crate::core::keys::{self, Hand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which hands the sensor actually reported in a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPresence {
    pub left: bool,
    pub right: bool,
}

impl HandPresence {
    pub fn both() -> Self {
        Self {
            left: true,
            right: true,
        }
    }

    pub fn contains(&self, hand: Hand) -> bool {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }

    pub fn set(&mut self, hand: Hand) {
        match hand {
            Hand::Left => self.left = true,
            Hand::Right => self.right = true,
        }
    }

    pub fn any(&self) -> bool {
        self.left || self.right
    }

    /// Whether every hand in `required` is present.
    pub fn covers(&self, required: &[Hand]) -> bool {
        required.iter().all(|&hand| self.contains(hand))
    }
}

/// Mapping from feature name to scalar, plus the hands reported on this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatFrame {
    values: BTreeMap<String, f64>,
    presence: HandPresence,
}

impl FlatFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presence(presence: HandPresence) -> Self {
        Self {
            values: BTreeMap::new(),
            presence,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn presence(&self) -> HandPresence {
        self.presence
    }

    pub fn mark_present(&mut self, hand: Hand) {
        self.presence.set(hand);
    }

    /// Iterate over keys and values in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Insert every entry of `other`, overwriting existing keys.
    pub fn extend<I>(&mut self, other: I)
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        self.values.extend(other);
    }

    /// Copy keys from `other` that this frame does not have yet.
    pub fn fill_missing_from(&mut self, other: &FlatFrame) {
        for (key, value) in &other.values {
            self.values.entry(key.clone()).or_insert(*value);
        }
    }

    /// Copy every key of `hand` from `other` that this frame does not have yet.
    pub fn fill_hand_from(&mut self, other: &FlatFrame, hand: Hand) {
        for (key, value) in other
            .values
            .iter()
            .filter(|(key, _)| keys::belongs_to(key, hand))
        {
            self.values.entry(key.clone()).or_insert(*value);
        }
    }

    /// Read a 3D vector stored as `{key}_0..2`.
    pub fn vector3(&self, keys: &[String; 3]) -> Result<[f64; 3], String> {
        let mut out = [0.0; 3];
        for (slot, key) in out.iter_mut().zip(keys.iter()) {
            *slot = self.get(key).ok_or_else(|| key.clone())?;
        }
        Ok(out)
    }
}
