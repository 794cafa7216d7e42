//! Session statistics.
//!
//! Counters are shared between the device workers and the tick loop, so they
//! are plain atomics. Cumulative totals can be persisted across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Frames received from any device
    frames_received: AtomicU64,
    /// Connect/disconnect lifecycle messages
    lifecycle_messages: AtomicU64,
    /// Messages that failed to parse
    malformed_messages: AtomicU64,
    /// Frames that came out of continuity resolution
    frames_resolved: AtomicU64,
    /// Ticks that reset the consecutive frame count
    continuity_breaks: AtomicU64,
    /// Classifier calls that produced a prediction
    predictions: AtomicU64,
    /// Classifier outputs containing NaN
    nan_predictions: AtomicU64,
    /// Classifier calls that failed outright
    classifier_errors: AtomicU64,
    /// Reconnection attempts across all devices
    reconnects: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            lifecycle_messages: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
            frames_resolved: AtomicU64::new(0),
            continuity_breaks: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            nan_predictions: AtomicU64::new(0),
            classifier_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Counters that continue from the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous session statistics: {e}");
        }

        stats
    }

    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lifecycle_message(&self) {
        self.lifecycle_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_message(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_resolved(&self) {
        self.frames_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_continuity_break(&self) {
        self.continuity_breaks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prediction(&self) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nan_prediction(&self) {
        self.nan_predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classifier_error(&self) {
        self.classifier_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            lifecycle_messages: self.lifecycle_messages.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            frames_resolved: self.frames_resolved.load(Ordering::Relaxed),
            continuity_breaks: self.continuity_breaks.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            nan_predictions: self.nan_predictions.load(Ordering::Relaxed),
            classifier_errors: self.classifier_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Frames received: {}\n\
             - Lifecycle messages: {}\n\
             - Malformed messages: {}\n\
             - Frames resolved: {}\n\
             - Continuity breaks: {}\n\
             - Predictions: {}\n\
             - NaN predictions: {}\n\
             - Classifier errors: {}\n\
             - Reconnect attempts: {}\n\
             - Session duration: {} seconds",
            s.frames_received,
            s.lifecycle_messages,
            s.malformed_messages,
            s.frames_resolved,
            s.continuity_breaks,
            s.predictions,
            s.nan_predictions,
            s.classifier_errors,
            s.reconnects,
            s.session_duration_secs
        )
    }

    /// Write cumulative totals to the persistence path, if any.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let s = self.snapshot();
        let persisted = PersistedStats {
            frames_received: s.frames_received,
            lifecycle_messages: s.lifecycle_messages,
            malformed_messages: s.malformed_messages,
            frames_resolved: s.frames_resolved,
            continuity_breaks: s.continuity_breaks,
            predictions: s.predictions,
            nan_predictions: s.nan_predictions,
            classifier_errors: s.classifier_errors,
            reconnects: s.reconnects,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let p: PersistedStats = serde_json::from_str(&content).map_err(std::io::Error::other)?;

        self.frames_received.store(p.frames_received, Ordering::Relaxed);
        self.lifecycle_messages.store(p.lifecycle_messages, Ordering::Relaxed);
        self.malformed_messages.store(p.malformed_messages, Ordering::Relaxed);
        self.frames_resolved.store(p.frames_resolved, Ordering::Relaxed);
        self.continuity_breaks.store(p.continuity_breaks, Ordering::Relaxed);
        self.predictions.store(p.predictions, Ordering::Relaxed);
        self.nan_predictions.store(p.nan_predictions, Ordering::Relaxed);
        self.classifier_errors.store(p.classifier_errors, Ordering::Relaxed);
        self.reconnects.store(p.reconnects, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub lifecycle_messages: u64,
    pub malformed_messages: u64,
    pub frames_resolved: u64,
    pub continuity_breaks: u64,
    pub predictions: u64,
    pub nan_predictions: u64,
    pub classifier_errors: u64,
    pub reconnects: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    frames_received: u64,
    #[serde(default)]
    lifecycle_messages: u64,
    #[serde(default)]
    malformed_messages: u64,
    #[serde(default)]
    frames_resolved: u64,
    #[serde(default)]
    continuity_breaks: u64,
    #[serde(default)]
    predictions: u64,
    #[serde(default)]
    nan_predictions: u64,
    #[serde(default)]
    classifier_errors: u64,
    #[serde(default)]
    reconnects: u64,
    last_updated: DateTime<Utc>,
}

/// Statistics shared across threads.
pub type SharedStats = Arc<SessionStats>;
