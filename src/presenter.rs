//! Operator-facing output.

use crate::config::PresenterConfig;
use crate::core::buffer::CircularBuffer;
use crate::core::motion::MotionIndicators;
use crate::core::session::{TickReport, TickStatus};
use crate::sensor::DeviceStatus;

/// Receives every tick report and device status change.
pub trait Presenter {
    fn present(&mut self, report: &TickReport);
    fn device_status(&mut self, device: usize, status: &DeviceStatus);
}

/// Recent indicator values, oldest first, for charting.
#[derive(Debug, Clone)]
pub struct IndicatorHistory {
    fury: CircularBuffer<f64>,
    angularity: CircularBuffer<f64>,
    confidence: CircularBuffer<f64>,
}

impl IndicatorHistory {
    pub fn new(length: usize) -> Self {
        Self {
            fury: CircularBuffer::new(length),
            angularity: CircularBuffer::new(length),
            confidence: CircularBuffer::new(length),
        }
    }

    pub fn record(&mut self, indicators: &MotionIndicators) {
        self.fury.add(indicators.fury);
        self.angularity.add(indicators.angularity);
        self.confidence.add(indicators.confidence);
    }

    pub fn fury(&self) -> Vec<f64> {
        self.fury.get()
    }

    pub fn angularity(&self) -> Vec<f64> {
        self.angularity.get()
    }

    pub fn confidence(&self) -> Vec<f64> {
        self.confidence.get()
    }

    pub fn samples(&self) -> u64 {
        self.fury.total_written()
    }
}

/// Prints to stdout the way the CLI reports everything else.
pub struct ConsolePresenter {
    print_interval: u64,
    history: IndicatorHistory,
    last_status: Option<TickStatus>,
    last_gesture: Option<String>,
    ticks: u64,
}

impl ConsolePresenter {
    pub fn new(config: &PresenterConfig) -> Self {
        Self {
            print_interval: config.print_interval.max(1),
            history: IndicatorHistory::new(config.history_length),
            last_status: None,
            last_gesture: None,
            ticks: 0,
        }
    }

    pub fn history(&self) -> &IndicatorHistory {
        &self.history
    }

    /// Most recent accepted gesture label.
    pub fn last_gesture(&self) -> Option<&str> {
        self.last_gesture.as_deref()
    }
}

impl Presenter for ConsolePresenter {
    fn present(&mut self, report: &TickReport) {
        self.ticks += 1;

        // A skipped frame does not change what the operator sees.
        if report.status != TickStatus::Skipped && self.last_status != Some(report.status) {
            match report.status {
                TickStatus::WaitingForHands => println!("Position hands over the sensor"),
                TickStatus::Tracking => println!("Tracking"),
                TickStatus::HandMissing => println!("Warning: a hand is missing"),
                TickStatus::Incomplete => println!("Frame incomplete, skipping"),
                TickStatus::Skipped => {}
            }
            self.last_status = Some(report.status);
        }

        if matches!(report.status, TickStatus::Tracking | TickStatus::HandMissing) {
            self.history.record(&report.indicators);
            if self.ticks % self.print_interval == 0 {
                println!(
                    "angularity: {:.2} fury: {:.2} confidence: {:.2}",
                    report.indicators.angularity,
                    report.indicators.fury,
                    report.indicators.confidence
                );
            }
        }

        if let Some(prediction) = &report.prediction {
            if prediction.accepted {
                println!(
                    "Gesture: {} ({:.0}%)",
                    prediction.label.replace('_', " "),
                    prediction.probability * 100.0
                );
                self.last_gesture = Some(prediction.label.clone());
            }
        }
    }

    fn device_status(&mut self, device: usize, status: &DeviceStatus) {
        match status {
            DeviceStatus::Connecting { attempt } => {
                println!("Device {device}: connecting (attempt {attempt})")
            }
            DeviceStatus::Online { handshake } => println!(
                "Device {device}: online {}",
                handshake.as_deref().unwrap_or("")
            ),
            DeviceStatus::Offline { reason, retry_in } => match retry_in {
                Some(delay) => {
                    println!("Device {device}: offline ({reason}), retrying in {delay:?}")
                }
                None => println!("Device {device}: offline ({reason})"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Prediction;

    fn report(status: TickStatus, fury: f64) -> TickReport {
        TickReport {
            status,
            resolved: None,
            indicators: MotionIndicators {
                fury,
                ..MotionIndicators::default()
            },
            prediction: None,
            frames_recorded: 0,
        }
    }

    #[test]
    fn test_history_keeps_latest_samples() {
        let mut history = IndicatorHistory::new(3);
        for fury in [0.1, 0.2, 0.3, 0.4] {
            history.record(&MotionIndicators {
                fury,
                ..MotionIndicators::default()
            });
        }
        assert_eq!(history.fury(), vec![0.2, 0.3, 0.4]);
        assert_eq!(history.samples(), 4);
    }

    #[test]
    fn test_only_tracked_ticks_are_sampled() {
        let mut presenter = ConsolePresenter::new(&PresenterConfig::default());
        presenter.present(&report(TickStatus::WaitingForHands, 0.9));
        presenter.present(&report(TickStatus::Tracking, 0.5));
        presenter.present(&report(TickStatus::HandMissing, 0.6));
        presenter.present(&report(TickStatus::Skipped, 0.7));
        assert_eq!(presenter.history().samples(), 2);
    }

    #[test]
    fn test_accepted_gesture_is_remembered() {
        let mut presenter = ConsolePresenter::new(&PresenterConfig::default());
        let mut tick = report(TickStatus::Tracking, 0.0);
        tick.prediction = Some(Prediction {
            index: 2,
            label: "thumbs_up".into(),
            probability: 0.4,
            accepted: false,
            confidence: 0.0,
        });
        presenter.present(&tick);
        assert_eq!(presenter.last_gesture(), None);

        if let Some(prediction) = tick.prediction.as_mut() {
            prediction.accepted = true;
        }
        presenter.present(&tick);
        assert_eq!(presenter.last_gesture(), Some("thumbs_up"));
    }
}
