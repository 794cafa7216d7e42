//! Gesture classifier seam.
//!
//! The session only needs a window in and a probability per gesture out. The
//! ONNX Runtime backend is compiled in with the `onnx` feature; without it, or
//! without a model path, the agent runs in indicator-only mode.

use crate::core::window::WindowTensor;
use crate::error::ClassifierError;

/// Anything that maps a `(K, F)` window to gesture probabilities.
pub trait Classifier: Send {
    /// `(sequence_length, feature_count)` the model was trained on.
    fn input_shape(&self) -> (usize, usize);

    /// One probability per gesture in vocabulary order.
    fn predict(&mut self, window: &WindowTensor) -> Result<Vec<f32>, ClassifierError>;
}

/// Reject a window whose shape differs from the model input.
pub fn check_shape(classifier: &dyn Classifier, window: &WindowTensor) -> Result<(), ClassifierError> {
    let expected = classifier.input_shape();
    if window.shape() != expected {
        return Err(ClassifierError::Shape {
            expected,
            actual: window.shape(),
        });
    }
    Ok(())
}

/// Index and value of the largest probability. `None` for an empty slice.
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, p)| match best {
            Some((_, top)) if top >= p => best,
            _ => Some((i, p)),
        })
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{check_shape, Classifier};
    use crate::config::ConfigError;
    use crate::core::window::WindowTensor;
    use crate::error::ClassifierError;
    use ndarray::Array3;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use tracing::info;

    /// Sequence model exported to ONNX, input `(1, K, F)`, output `(1, G)`.
    pub struct OnnxClassifier {
        session: Session,
        input_name: String,
        output_name: String,
        shape: (usize, usize),
    }

    impl OnnxClassifier {
        pub fn load(
            path: &Path,
            sequence_length: usize,
            feature_count: usize,
        ) -> Result<Self, ConfigError> {
            let model_error = |e: ort::Error| ConfigError::Model(format!("{}: {e}", path.display()));

            let session = Session::builder()
                .map_err(model_error)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(model_error)?
                .commit_from_file(path)
                .map_err(model_error)?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| ConfigError::Model("model declares no inputs".into()))?;
            let output_name = session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or_else(|| ConfigError::Model("model declares no outputs".into()))?;

            info!(
                "Loaded model {} (input '{}', output '{}')",
                path.display(),
                input_name,
                output_name
            );

            Ok(Self {
                session,
                input_name,
                output_name,
                shape: (sequence_length, feature_count),
            })
        }
    }

    impl Classifier for OnnxClassifier {
        fn input_shape(&self) -> (usize, usize) {
            self.shape
        }

        fn predict(&mut self, window: &WindowTensor) -> Result<Vec<f32>, ClassifierError> {
            check_shape(self, window)?;
            let backend = |e: ort::Error| ClassifierError::Backend(e.to_string());

            let (k, f) = window.shape();
            let input = Array3::from_shape_vec((1, k, f), window.data.clone())
                .map_err(|e| ClassifierError::Backend(e.to_string()))?;
            let tensor = Tensor::from_array(input).map_err(backend)?;

            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => tensor])
                .map_err(backend)?;
            let probabilities: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
                .try_extract_array()
                .map_err(backend)?;

            Ok(probabilities.iter().copied().collect())
        }
    }
}
