//! Error types shared across the pipeline.
//!
//! Only [`ConfigError`](crate::config::ConfigError) is fatal. Everything here is
//! handled inside the tick loop or the device workers.

use crate::core::keys::Hand;
use thiserror::Error;

/// A tick that cannot produce a resolved frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContinuityError {
    /// The sensor reported no hands at all, after an earlier frame was resolved
    #[error("no hands in frame")]
    NoHands,
    /// A required hand is missing and there is no earlier frame to borrow from
    #[error("waiting for hands: missing {missing:?}")]
    WaitingForHands { missing: Vec<Hand> },
    /// A raw key needed downstream is absent after resolution
    #[error("resolved frame is missing key {0}")]
    MissingKey(String),
}

/// Failure while computing derived features.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivedError {
    #[error("missing key {0}")]
    MissingKey(String),
}

impl From<DerivedError> for ContinuityError {
    fn from(err: DerivedError) -> Self {
        match err {
            DerivedError::MissingKey(key) => ContinuityError::MissingKey(key),
        }
    }
}

/// Failure of a single classifier call.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Input tensor does not match what the model expects
    #[error("input shape mismatch: model expects {expected:?}, got {actual:?}")]
    Shape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// Output length differs from the gesture vocabulary
    #[error("model returned {actual} probabilities for {expected} gestures")]
    OutputLength { expected: usize, actual: usize },
    /// Output contains NaN
    #[error("model output contains NaN")]
    NumericAnomaly,
    /// Backend failure
    #[error("inference failed: {0}")]
    Backend(String),
}

/// Failure on a device connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("no message within {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection closed by peer")]
    Closed,
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("sensor hub is already running")]
    AlreadyRunning,
}

impl TransportError {
    /// Whether the connection has to be reopened.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_)
                | TransportError::Timeout(_)
                | TransportError::Closed
                | TransportError::Socket(_)
        )
    }
}

/// Failure while writing a recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("nothing to write")]
    Empty,
}
