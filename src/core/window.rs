//! Rolling window of standardized feature vectors.
//!
//! The window is read out with [`CircularBuffer::get`]: the oldest vector is the
//! one immediately after the last write. The counter of consecutive resolved
//! frames is kept separately from the buffer's write pointer, so a continuity
//! break can reset it without touching stored data.

use crate::core::buffer::CircularBuffer;

/// Row-major `(sequence_length, feature_count)` classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTensor {
    pub sequence_length: usize,
    pub feature_count: usize,
    pub data: Vec<f32>,
}

impl WindowTensor {
    pub fn shape(&self) -> (usize, usize) {
        (self.sequence_length, self.feature_count)
    }

    /// One time step of the window.
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.feature_count;
        &self.data[start..start + self.feature_count]
    }
}

/// Holds the last K feature vectors and decides when a prediction is due.
#[derive(Debug, Clone)]
pub struct WindowEngine {
    buffer: CircularBuffer<Vec<f64>>,
    feature_count: usize,
    prediction_interval: u64,
    frames_recorded: u64,
}

impl WindowEngine {
    /// `prediction_interval` of zero falls back to the sequence length.
    pub fn new(sequence_length: usize, feature_count: usize, prediction_interval: u64) -> Self {
        let sequence_length = sequence_length.max(1);
        let prediction_interval = if prediction_interval == 0 {
            sequence_length as u64
        } else {
            prediction_interval
        };
        Self {
            buffer: CircularBuffer::filled_with(sequence_length, vec![0.0; feature_count]),
            feature_count,
            prediction_interval,
            frames_recorded: 0,
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Consecutive resolved frames since the last continuity break.
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Store a vector and report whether a prediction is due.
    pub fn push(&mut self, vector: Vec<f64>) -> bool {
        debug_assert_eq!(vector.len(), self.feature_count);
        self.buffer.add(vector);
        self.frames_recorded += 1;
        self.prediction_due()
    }

    pub fn prediction_due(&self) -> bool {
        self.frames_recorded >= self.sequence_length() as u64
            && self.frames_recorded % self.prediction_interval == 0
    }

    /// Forget the run of consecutive frames. Stored vectors stay in place.
    pub fn reset_recorded(&mut self) {
        self.frames_recorded = 0;
    }

    /// Vectors oldest to newest.
    pub fn window(&self) -> Vec<Vec<f64>> {
        self.buffer.get()
    }

    /// The window as classifier input.
    pub fn tensor(&self) -> WindowTensor {
        let rows = self.buffer.get();
        let mut data = Vec::with_capacity(rows.len() * self.feature_count);
        for row in &rows {
            data.extend(row.iter().map(|&v| v as f32));
        }
        WindowTensor {
            sequence_length: rows.len(),
            feature_count: self.feature_count,
            data,
        }
    }
}
