//! Smoothed movement indicators.
//!
//! Raw fury is the larger of two normalized magnitudes, each clamped to [0, 1]:
//! the peak palm velocity component, and the peak change of any adjacent
//! fingertip gap since the previous complete frame. Fury, angularity and
//! confidence are exponential moving averages over their raw values.

use crate::core::derived::{fingertip_gaps, read_tips, read_vector};
use crate::core::frame::FlatFrame;
use crate::core::keys::{self, Hand};
use crate::error::DerivedError;
use serde::{Deserialize, Serialize};

/// Smoothing and scaling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Weight of the old value in the fury average
    pub fury_beta: f64,
    /// Weight of the old value in the angularity average
    pub angularity_beta: f64,
    /// Weight of the old value in the confidence average
    pub confidence_beta: f64,
    /// Raw angularity above this replaces the average outright
    pub angularity_threshold: f64,
    /// Ticks between angularity updates
    pub angularity_interval: u64,
    /// Top probability that maps to zero confidence
    pub confidence_zero: f64,
    /// Palm velocity (mm/s) that maps to raw fury 1.0
    pub fury_velocity_divisor: f64,
    /// Change in fingertip gap (mm per frame) that maps to raw fury 1.0
    pub fury_gap_divisor: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            fury_beta: 0.9,
            angularity_beta: 0.95,
            confidence_beta: 0.9,
            angularity_threshold: 0.72,
            angularity_interval: 10,
            confidence_zero: 0.5,
            fury_velocity_divisor: 1000.0,
            fury_gap_divisor: 20.0,
        }
    }
}

impl MotionSettings {
    /// Check ranges. Returns a description of the first bad value.
    pub fn validate(&self) -> Result<(), String> {
        for (name, beta) in [
            ("fury_beta", self.fury_beta),
            ("angularity_beta", self.angularity_beta),
            ("confidence_beta", self.confidence_beta),
        ] {
            if !(beta > 0.0 && beta < 1.0) {
                return Err(format!("{name} must lie in (0, 1), got {beta}"));
            }
        }
        if !(0.0..1.0).contains(&self.confidence_zero) {
            return Err(format!(
                "confidence_zero must lie in [0, 1), got {}",
                self.confidence_zero
            ));
        }
        if self.angularity_interval == 0 {
            return Err("angularity_interval must be at least 1".to_string());
        }
        if self.fury_velocity_divisor <= 0.0 || self.fury_gap_divisor <= 0.0 {
            return Err("fury divisors must be positive".to_string());
        }
        Ok(())
    }
}

/// Current indicator values handed to the presenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionIndicators {
    pub fury: f64,
    pub previous_fury: f64,
    pub angularity: f64,
    pub confidence: f64,
    pub raw_fury: f64,
    pub raw_angularity: f64,
}

/// Exponential smoothing state for the whole session.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    settings: MotionSettings,
    hands: Vec<Hand>,
    indicators: MotionIndicators,
    ticks: u64,
}

impl MotionTracker {
    pub fn new(settings: MotionSettings, hands: Vec<Hand>) -> Self {
        Self {
            settings,
            hands,
            indicators: MotionIndicators::default(),
            ticks: 0,
        }
    }

    pub fn indicators(&self) -> MotionIndicators {
        self.indicators
    }

    /// Update fury (and, on its interval, angularity) from a resolved frame.
    ///
    /// `previous` is the last complete frame; on the first tick pass the current
    /// frame again so the gap delta is zero.
    pub fn observe(
        &mut self,
        current: &FlatFrame,
        previous: &FlatFrame,
    ) -> Result<MotionIndicators, DerivedError> {
        let raw = self.raw_fury(current, previous)?;
        self.update_fury(raw);

        self.ticks += 1;
        if self.ticks % self.settings.angularity_interval == 0 {
            let raw_angularity = (raw - self.indicators.previous_fury).abs();
            self.update_angularity(raw_angularity);
            self.indicators.previous_fury = raw;
        }
        Ok(self.indicators)
    }

    /// Raw fury for one tick, in [0, 1].
    pub fn raw_fury(&self, current: &FlatFrame, previous: &FlatFrame) -> Result<f64, DerivedError> {
        let mut peak_velocity: f64 = 0.0;
        let mut peak_gap_delta: f64 = 0.0;

        for &hand in &self.hands {
            let velocity = read_vector(current, &keys::hand_vector(hand, "palmVelocity"))?;
            for component in velocity {
                peak_velocity = peak_velocity.max(component.abs());
            }

            let now = fingertip_gaps(&read_tips(current, hand)?);
            let before = fingertip_gaps(&read_tips(previous, hand)?);
            for (a, b) in now.iter().zip(before.iter()) {
                peak_gap_delta = peak_gap_delta.max((a - b).abs());
            }
        }

        let velocity_term = (peak_velocity / self.settings.fury_velocity_divisor).clamp(0.0, 1.0);
        let gap_term = (peak_gap_delta / self.settings.fury_gap_divisor).clamp(0.0, 1.0);
        Ok(velocity_term.max(gap_term))
    }

    pub fn update_fury(&mut self, raw_fury: f64) {
        let beta = self.settings.fury_beta;
        self.indicators.raw_fury = raw_fury;
        self.indicators.fury = beta * self.indicators.fury + (1.0 - beta) * raw_fury;
    }

    /// Fast attack above the threshold, exponential decay below it.
    pub fn update_angularity(&mut self, raw_angularity: f64) {
        self.indicators.raw_angularity = raw_angularity;
        if raw_angularity > self.settings.angularity_threshold {
            self.indicators.angularity = raw_angularity;
        } else {
            let beta = self.settings.angularity_beta;
            self.indicators.angularity =
                beta * self.indicators.angularity + (1.0 - beta) * raw_angularity;
        }
    }

    /// Fold the classifier's top probability into the confidence average.
    ///
    /// Returns `false` and leaves confidence untouched when `max_probability` is NaN.
    pub fn update_confidence(&mut self, max_probability: f64) -> bool {
        if max_probability.is_nan() {
            return false;
        }
        let zero = self.settings.confidence_zero;
        let adjusted = ((max_probability - zero) / (1.0 - zero)).max(0.0);
        let beta = self.settings.confidence_beta;
        self.indicators.confidence = beta * self.indicators.confidence + (1.0 - beta) * adjusted;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::FINGERS;

    fn hand_frame(velocity: [f64; 3], spread: f64) -> FlatFrame {
        let mut frame = FlatFrame::new();
        for (i, v) in velocity.iter().enumerate() {
            frame.insert(format!("right_palmVelocity_{i}"), *v);
        }
        for (f, finger) in FINGERS.iter().enumerate() {
            frame.insert(format!("right_{finger}_tipPosition_0"), spread * f as f64);
            frame.insert(format!("right_{finger}_tipPosition_1"), 0.0);
            frame.insert(format!("right_{finger}_tipPosition_2"), 0.0);
        }
        frame
    }

    fn tracker() -> MotionTracker {
        MotionTracker::new(MotionSettings::default(), vec![Hand::Right])
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(MotionSettings::default().validate().is_ok());
        let bad = MotionSettings {
            fury_beta: 1.0,
            ..MotionSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_fury_converges_monotonically_without_overshoot() {
        let mut tracker = tracker();
        let mut last = 0.0;
        for _ in 0..200 {
            tracker.update_fury(1.0);
            let fury = tracker.indicators().fury;
            assert!(fury >= last);
            assert!(fury <= 1.0);
            last = fury;
        }
        assert!(last > 0.99);
    }

    #[test]
    fn test_angularity_fast_attack() {
        let mut tracker = tracker();
        tracker.update_angularity(0.9);
        assert_eq!(tracker.indicators().angularity, 0.9);
    }

    #[test]
    fn test_angularity_decays_below_threshold() {
        let mut tracker = tracker();
        tracker.update_angularity(0.9);
        tracker.update_angularity(0.0);
        let angularity = tracker.indicators().angularity;
        assert!((angularity - 0.9 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_raw_fury_from_velocity() {
        let tracker = tracker();
        let frame = hand_frame([0.0, -500.0, 100.0], 10.0);
        let raw = tracker.raw_fury(&frame, &frame).unwrap();
        assert!((raw - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_raw_fury_from_finger_gaps_is_clamped() {
        let tracker = tracker();
        let before = hand_frame([0.0; 3], 10.0);
        let after = hand_frame([0.0; 3], 50.0);
        assert_eq!(tracker.raw_fury(&after, &before).unwrap(), 1.0);

        let slightly = hand_frame([0.0; 3], 15.0);
        let raw = tracker.raw_fury(&slightly, &before).unwrap();
        assert!((raw - 5.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_angularity_refreshes_on_interval() {
        let mut tracker = tracker();
        let still = hand_frame([0.0; 3], 10.0);
        let fast = hand_frame([900.0, 0.0, 0.0], 10.0);

        for _ in 0..9 {
            tracker.observe(&fast, &still).unwrap();
        }
        assert_eq!(tracker.indicators().angularity, 0.0);

        // tenth tick: raw fury 0.9 against a previous snapshot of 0.0
        let indicators = tracker.observe(&fast, &still).unwrap();
        assert!((indicators.raw_angularity - 0.9).abs() < 1e-12);
        assert!((indicators.angularity - 0.9).abs() < 1e-12);
        assert!((indicators.previous_fury - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_rescaling_and_nan() {
        let mut tracker = tracker();
        assert!(tracker.update_confidence(1.0));
        assert!((tracker.indicators().confidence - 0.1).abs() < 1e-12);

        let before = tracker.indicators().confidence;
        assert!(!tracker.update_confidence(f64::NAN));
        assert_eq!(tracker.indicators().confidence, before);

        // below the effective zero counts as zero
        tracker.update_confidence(0.3);
        assert!((tracker.indicators().confidence - before * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_missing_velocity_is_an_error() {
        let tracker = tracker();
        let frame = FlatFrame::new();
        assert!(tracker.raw_fury(&frame, &frame).is_err());
    }
}
