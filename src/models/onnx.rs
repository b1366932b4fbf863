//! ONNX-backed classifier.
//!
//! Loads the registry artifact with ONNX Runtime and handles the two output
//! layouts sklearn-family exports produce: plain probability tensors, and
//! the zipmap `seq(map(int64, float))` layout.

use std::path::Path;
use std::sync::Mutex;

use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::features::FeatureVector;
use crate::models::classifier::{Classifier, Prediction};

/// Classifier backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a
/// mutex; predictions are short and the lock is uncontended in practice.
#[derive(Debug)]
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    label_name: Option<String>,
}

impl OnnxClassifier {
    /// Load a model artifact from disk.
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::ArtifactMissing(path.display().to_string()));
        }

        ort::init().commit()?;

        info!(path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        let label_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        info!(
            input = %input_name,
            output = %output_name,
            label = ?label_name,
            "Model loaded successfully"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            label_name,
        })
    }

    /// Extract the fraud probability from the session outputs, trying the
    /// named probability output first and falling back to any non-label
    /// output.
    fn extract_probability(&self, outputs: &ort::session::SessionOutputs) -> Result<f64, ModelError> {
        if let Some(output) = outputs.get(&self.output_name) {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                return Ok(fraud_prob_from_tensor(&shape, data));
            }
            if DynSequenceValueType::can_downcast(&output.dtype()) {
                if let Ok(prob) = extract_from_sequence_map(output) {
                    return Ok(prob);
                }
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }

            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                debug!(output = %name, "Extracted probability from fallback output");
                return Ok(fraud_prob_from_tensor(&shape, data));
            }

            if DynSequenceValueType::can_downcast(&output.dtype()) {
                if let Ok(prob) = extract_from_sequence_map(&output) {
                    return Ok(prob);
                }
            }
        }

        Err(ModelError::MissingOutput(self.output_name.clone()))
    }

    /// Extract the binary class. Exports without a label output fall back
    /// to thresholding the probability at 0.5.
    fn extract_label(&self, outputs: &ort::session::SessionOutputs, probability: f64) -> bool {
        if let Some(name) = &self.label_name {
            if let Some(output) = outputs.get(name) {
                if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
                    if let Some(&label) = data.first() {
                        return label == 1;
                    }
                }
            }
            warn!(output = %name, "Label output not extractable, thresholding probability");
        }
        probability >= 0.5
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        let values = features.as_slice();
        let shape = vec![1_i64, values.len() as i64];
        let input_tensor = Tensor::from_array((shape, values.to_vec()))?;

        let mut session = self.session.lock().map_err(|_| ModelError::LockPoisoned)?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let probability = self.extract_probability(&outputs)?;
        let is_fraud = self.extract_label(&outputs, probability);

        Ok(Prediction::new(is_fraud, probability))
    }
}

/// Read the fraud-class probability out of a `[batch, classes]` (or flat)
/// probability tensor.
fn fraud_prob_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> f64 {
    let dims: Vec<i64> = shape.iter().copied().collect();

    if dims.len() == 2 {
        let num_classes = dims[1] as usize;
        if num_classes >= 2 {
            return data[1] as f64;
        } else if num_classes == 1 {
            return data[0] as f64;
        }
    } else if dims.len() == 1 {
        let num_classes = dims[0] as usize;
        if num_classes >= 2 {
            return data[1] as f64;
        } else if num_classes == 1 {
            return data[0] as f64;
        }
    }

    data.last().map(|&v| v as f64).unwrap_or(0.5)
}

/// Extract the class-1 probability from the zipmap `seq(map(int64, float))`
/// layout sklearn pipelines export by default.
fn extract_from_sequence_map(output: &ort::value::DynValue) -> Result<f64, ModelError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|_| ModelError::MissingOutput("probability sequence".to_string()))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let map_value = maps
        .first()
        .ok_or_else(|| ModelError::MissingOutput("empty probability sequence".to_string()))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

    for (class_id, prob) in &kv_pairs {
        if *class_id == 1 {
            return Ok(*prob as f64);
        }
    }
    // Binary model with only class 0 reported
    for (class_id, prob) in &kv_pairs {
        if *class_id == 0 {
            return Ok(1.0 - *prob as f64);
        }
    }

    Err(ModelError::MissingOutput(
        "no class probability in map".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact() {
        let err = OnnxClassifier::load("does/not/exist.onnx", 1).unwrap_err();
        assert!(matches!(err, ModelError::ArtifactMissing(_)));
    }
}
