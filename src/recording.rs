//! Frame capture for building training data.
//!
//! Frames are held in memory and written as a single CSV file on shutdown.
//! The header is the union of every key seen, sorted, with the gesture label
//! first; cells a frame did not carry are left empty.

use crate::core::frame::FlatFrame;
use crate::core::keys::GESTURE;
use crate::error::RecordingError;
use chrono::Local;
use csv::Writer;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

struct RecordedFrame {
    values: BTreeMap<String, f64>,
    gesture: Option<String>,
}

/// In-memory frame store.
pub struct Recorder {
    output_dir: PathBuf,
    session_name: String,
    frames: Vec<RecordedFrame>,
}

impl Recorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            frames: Vec::new(),
        }
    }

    pub fn add_frame(&mut self, frame: &FlatFrame, gesture: Option<&str>) {
        self.frames.push(RecordedFrame {
            values: frame.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            gesture: gesture.map(str::to_string),
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Where [`export_csv`](Self::export_csv) writes.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.session_name))
    }

    /// Column order: `gesture` first when any frame is labelled, then keys sorted.
    pub fn header(&self) -> Vec<String> {
        let keys: BTreeSet<&str> = self
            .frames
            .iter()
            .flat_map(|f| f.values.keys().map(String::as_str))
            .filter(|k| *k != GESTURE)
            .collect();

        let labelled = self.frames.iter().any(|f| f.gesture.is_some());
        let mut header = Vec::with_capacity(keys.len() + 1);
        if labelled {
            header.push(GESTURE.to_string());
        }
        header.extend(keys.into_iter().map(str::to_string));
        header
    }

    pub fn export_csv(&self) -> Result<PathBuf, RecordingError> {
        if self.frames.is_empty() {
            return Err(RecordingError::Empty);
        }
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path();
        let file = File::create(&path)?;
        self.write_to(Writer::from_writer(file))?;
        info!("Wrote {} frames to {}", self.frames.len(), path.display());
        Ok(path)
    }

    fn write_to<W: std::io::Write>(&self, mut writer: Writer<W>) -> Result<(), RecordingError> {
        let header = self.header();
        writer.write_record(&header)?;

        let mut row = Vec::with_capacity(header.len());
        for frame in &self.frames {
            row.clear();
            for column in &header {
                let cell = if column == GESTURE {
                    frame.gesture.clone().unwrap_or_default()
                } else {
                    frame
                        .values
                        .get(column)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                };
                row.push(cell);
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// How captured frames are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOrder {
    /// Every gesture in vocabulary order
    Sequential,
    /// The first gesture between each of the others
    Alternating,
    /// Every gesture once per pass, reshuffled after each pass
    Random,
}

/// A label change announced by [`GestureSchedule::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEvent {
    Prepare(String),
    Start(String),
}

/// Gesture label for each captured frame.
#[derive(Debug, Clone)]
pub enum GestureSchedule {
    Unlabelled,
    Fixed(String),
    Cycle(GestureCycle),
}

impl GestureSchedule {
    /// Move the schedule to `elapsed` since capture started.
    pub fn advance(&mut self, elapsed: Duration) -> Option<ScheduleEvent> {
        match self {
            GestureSchedule::Cycle(cycle) => cycle.advance(elapsed),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&str> {
        match self {
            GestureSchedule::Unlabelled => None,
            GestureSchedule::Fixed(label) => Some(label),
            GestureSchedule::Cycle(cycle) => cycle.current(),
        }
    }
}

/// Timed walk through the vocabulary with a warning before each change.
#[derive(Debug, Clone)]
pub struct GestureCycle {
    gestures: Vec<String>,
    order: CycleOrder,
    /// Vocabulary indices in the order of the current pass
    sequence: Vec<usize>,
    rng: StdRng,
    delay: Duration,
    warning: Duration,
    change_at: Duration,
    current: usize,
    next: usize,
    position: usize,
    warned: bool,
    started: bool,
}

impl GestureCycle {
    pub fn new(gestures: Vec<String>, order: CycleOrder, delay: Duration) -> Self {
        Self {
            sequence: (0..gestures.len()).collect(),
            rng: StdRng::from_entropy(),
            gestures,
            order,
            delay,
            warning: Duration::from_secs(1),
            change_at: Duration::ZERO,
            current: 0,
            next: 0,
            position: 0,
            warned: false,
            started: false,
        }
    }

    /// `None` until the first change has happened.
    pub fn current(&self) -> Option<&str> {
        if !self.started {
            return None;
        }
        self.gestures.get(self.current).map(String::as_str)
    }

    pub fn advance(&mut self, elapsed: Duration) -> Option<ScheduleEvent> {
        if self.gestures.is_empty() {
            return None;
        }

        if elapsed >= self.change_at {
            self.current = self.next;
            self.change_at = elapsed + self.delay;
            self.warned = false;
            self.started = true;
            if self.order != CycleOrder::Alternating || self.current == 0 {
                self.position += 1;
            }
            return Some(ScheduleEvent::Start(self.gestures[self.current].clone()));
        }

        if !self.warned && elapsed + self.warning >= self.change_at {
            self.next = match self.order {
                CycleOrder::Sequential | CycleOrder::Random => {
                    if self.position >= self.gestures.len() {
                        self.position = 0;
                        if self.order == CycleOrder::Random {
                            self.sequence.shuffle(&mut self.rng);
                        }
                    }
                    self.sequence[self.position]
                }
                CycleOrder::Alternating => {
                    if self.position >= self.gestures.len() {
                        self.position = 1.min(self.gestures.len() - 1);
                    }
                    if self.current == 0 {
                        self.position
                    } else {
                        0
                    }
                }
            };
            self.warned = true;
            return Some(ScheduleEvent::Prepare(self.gestures[self.next].clone()));
        }

        None
    }
}
