//! The per-tick pipeline.
//!
//! A [`Session`] owns every piece of state that survives between frames:
//! the continuity resolver, the feature order, the rolling window, the
//! indicator averages and the optional classifier. The tick loop feeds it one
//! unpacked frame at a time and hands the resulting [`TickReport`] to the
//! presenter.
//!
//! ```text
//!   FlatFrame ─▶ resolve ─▶ derive ─▶ fix schema ─▶ indicators
//!                                        │
//!                                        ▼
//!                         standardize ─▶ window ─▶ classifier
//! ```

use crate::classifier::{argmax, Classifier};
use crate::config::{Config, ConfigError};
use crate::core::continuity::{ContinuityResolver, Resolved};
use crate::core::derived::DerivedFeatureEngine;
use crate::core::frame::FlatFrame;
use crate::core::keys::Hand;
use crate::core::motion::{MotionIndicators, MotionTracker};
use crate::core::schema::{FeatureSchema, Standardizer};
use crate::core::window::WindowEngine;
use crate::error::{ClassifierError, ContinuityError};
use crate::params::ParameterSet;
use crate::stats::{SessionStats, SharedStats};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the session made of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    /// No usable frame yet, or the run of frames was broken
    WaitingForHands,
    /// Every required hand was tracked
    Tracking,
    /// A required hand was filled in from the previous frame
    HandMissing,
    /// The resolved frame lacked keys the features need
    Incomplete,
    /// The frame had no hands; it was dropped and the run goes on
    Skipped,
}

/// Classifier output for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Argmax over the gesture vocabulary
    pub index: usize,
    /// Vocabulary entry at `index`
    pub label: String,
    /// Probability at `index`
    pub probability: f32,
    /// Whether `probability` passed the reporting threshold
    pub accepted: bool,
    /// Confidence average after this prediction
    pub confidence: f64,
}

/// Everything the presenter needs about one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub status: TickStatus,
    pub resolved: Option<Resolved>,
    pub indicators: MotionIndicators,
    pub prediction: Option<Prediction>,
    /// Consecutive resolved frames after this tick
    pub frames_recorded: u64,
}

enum SchemaState {
    Pending,
    Fixed,
}

/// Frame-to-prediction state machine.
pub struct Session {
    hands: Vec<Hand>,
    resolver: ContinuityResolver,
    derived: DerivedFeatureEngine,
    predictors: Vec<String>,
    schema: FeatureSchema,
    schema_state: SchemaState,
    standardizer: Standardizer,
    window: WindowEngine,
    motion: MotionTracker,
    previous_complete: Option<FlatFrame>,
    classifier: Option<Box<dyn Classifier>>,
    gestures: Vec<String>,
    min_probability: f64,
    frame_stride: u64,
    frames_offered: u64,
    stats: SharedStats,
}

impl Session {
    /// Build a session and check the configuration against the parameters.
    ///
    /// Fails when a statistic is missing or unusable, or when the classifier's
    /// input shape does not match the configured window.
    pub fn new(
        config: &Config,
        params: &ParameterSet,
        classifier: Option<Box<dyn Classifier>>,
    ) -> Result<Self, ConfigError> {
        let hands = config.pipeline.hands.hands();
        let predictors = params.predictors(&hands);
        let schema = params.expected_schema(&hands);
        if schema.is_empty() {
            return Err(ConfigError::Params("no features to classify".into()));
        }
        let standardizer = Standardizer::new(&schema, &params.means, &params.stds)?;

        let sequence_length = config.model.sequence_length;
        if let Some(classifier) = &classifier {
            let (k, f) = classifier.input_shape();
            if f != schema.len() {
                return Err(ConfigError::FeatureCount {
                    model: f,
                    schema: schema.len(),
                });
            }
            if k != sequence_length {
                return Err(ConfigError::Model(format!(
                    "model expects windows of {k} frames, sequence_length is {sequence_length}"
                )));
            }
        }

        Ok(Self {
            resolver: ContinuityResolver::new(hands.clone(), config.pipeline.refresh_policy),
            derived: DerivedFeatureEngine::new(params.derived.clone(), hands.clone()),
            window: WindowEngine::new(
                sequence_length,
                schema.len(),
                config.model.prediction_interval,
            ),
            motion: MotionTracker::new(config.motion.clone(), hands.clone()),
            hands,
            predictors,
            schema,
            schema_state: SchemaState::Pending,
            standardizer,
            previous_complete: None,
            classifier,
            gestures: params.gestures.clone(),
            min_probability: config.model.min_probability,
            frame_stride: u64::from(config.pipeline.frame_stride.max(1)),
            frames_offered: 0,
            stats: Arc::new(SessionStats::new()),
        })
    }

    /// Count into an existing statistics object instead of a private one.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Whether the first complete frame has confirmed the feature order.
    pub fn schema_fixed(&self) -> bool {
        matches!(self.schema_state, SchemaState::Fixed)
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn indicators(&self) -> MotionIndicators {
        self.motion.indicators()
    }

    pub fn frame_stride(&self) -> u32 {
        self.frame_stride as u32
    }

    /// Count a received frame and say whether it should be unpacked and ticked.
    pub fn admit(&mut self) -> bool {
        self.frames_offered += 1;
        self.frames_offered % self.frame_stride == 0
    }

    /// Run one frame through the pipeline.
    ///
    /// `None` stands for a frame without hands. Only a schema that disagrees
    /// with the configuration is an error; everything else is reported in the
    /// returned status.
    pub fn tick(&mut self, frame: Option<FlatFrame>) -> Result<TickReport, ConfigError> {
        let resolved = match self.resolver.resolve(frame) {
            Ok(resolved) => resolved,
            Err(ContinuityError::NoHands) => {
                debug!("Frame without hands skipped");
                return Ok(TickReport {
                    status: TickStatus::Skipped,
                    resolved: None,
                    indicators: self.motion.indicators(),
                    prediction: None,
                    frames_recorded: self.window.frames_recorded(),
                });
            }
            Err(e) => {
                debug!("Continuity break: {e}");
                return Ok(self.break_run(TickStatus::WaitingForHands, None));
            }
        };

        let mut resolved = resolved;
        match self.derived.compute(&resolved.frame) {
            Ok(features) => resolved.frame.extend(features),
            Err(e) => {
                warn!("Dropping frame: {}", ContinuityError::from(e));
                return Ok(self.break_run(TickStatus::Incomplete, Some(resolved)));
            }
        }

        if let SchemaState::Pending = self.schema_state {
            self.fix_schema(&resolved.frame)?;
        }

        let raw = match self.schema.extract(&resolved.frame) {
            Ok(raw) => raw,
            Err(key) => {
                warn!("Dropping frame: {}", ContinuityError::MissingKey(key));
                return Ok(self.break_run(TickStatus::Incomplete, Some(resolved)));
            }
        };

        let previous = self.previous_complete.as_ref().unwrap_or(&resolved.frame);
        if let Err(e) = self.motion.observe(&resolved.frame, previous) {
            debug!("Indicators not updated: {e}");
        }
        self.previous_complete = Some(resolved.frame.clone());

        self.stats.record_frame_resolved();
        let due = self.window.push(self.standardizer.standardize(&raw));
        let prediction = if due { self.predict() } else { None };

        let status = if resolved.was_filled() {
            TickStatus::HandMissing
        } else {
            TickStatus::Tracking
        };

        Ok(TickReport {
            status,
            resolved: Some(resolved),
            indicators: self.motion.indicators(),
            prediction,
            frames_recorded: self.window.frames_recorded(),
        })
    }

    fn break_run(&mut self, status: TickStatus, resolved: Option<Resolved>) -> TickReport {
        if self.window.frames_recorded() > 0 {
            self.stats.record_continuity_break();
        }
        self.window.reset_recorded();
        TickReport {
            status,
            resolved,
            indicators: self.motion.indicators(),
            prediction: None,
            frames_recorded: 0,
        }
    }

    /// Compare the features this frame actually yields with the configured order.
    fn fix_schema(&mut self, frame: &FlatFrame) -> Result<(), ConfigError> {
        let present: Vec<String> = self
            .predictors
            .iter()
            .filter(|key| frame.contains_key(key))
            .cloned()
            .collect();
        let derived = self.derived.keys().into_iter().filter(|key| frame.contains_key(key));
        let actual = FeatureSchema::new(&present, derived);

        let diff = self.schema.difference(&actual);
        if !diff.is_empty() {
            error!("Feature order mismatch on first complete frame: {diff:?}");
            return Err(ConfigError::SchemaMismatch(diff));
        }

        info!("Feature order fixed with {} features", self.schema.len());
        self.schema_state = SchemaState::Fixed;
        Ok(())
    }

    fn predict(&mut self) -> Option<Prediction> {
        let classifier = self.classifier.as_mut()?;
        let tensor = self.window.tensor();

        let result = classifier.predict(&tensor).and_then(|probabilities| {
            if probabilities.len() != self.gestures.len() {
                return Err(ClassifierError::OutputLength {
                    expected: self.gestures.len(),
                    actual: probabilities.len(),
                });
            }
            if probabilities.iter().any(|p| p.is_nan()) {
                return Err(ClassifierError::NumericAnomaly);
            }
            Ok(probabilities)
        });

        let probabilities = match result {
            Ok(p) => p,
            Err(ClassifierError::NumericAnomaly) => {
                warn!("Classifier returned NaN; confidence unchanged");
                self.stats.record_nan_prediction();
                return None;
            }
            Err(e) => {
                error!("Prediction failed: {e}");
                self.stats.record_classifier_error();
                return None;
            }
        };

        let (index, probability) = argmax(&probabilities)?;
        self.motion.update_confidence(f64::from(probability));
        self.stats.record_prediction();

        let label = self.gestures.get(index).cloned().unwrap_or_default();
        debug!("Prediction {label} ({probability:.3}) from {probabilities:?}");

        Some(Prediction {
            index,
            label,
            probability,
            accepted: f64::from(probability) > self.min_probability,
            confidence: self.motion.indicators().confidence,
        })
    }
}
