//! Classifier trait separating inference from the serving layer

use crate::error::ModelError;
use crate::features::FeatureVector;

/// Output of a single classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Binary class output of the model
    pub is_fraud: bool,
    /// Fraud class probability, clamped to [0, 1]
    pub probability: f64,
}

impl Prediction {
    /// The clamp is defensive: the model's own calibration should already
    /// keep probabilities in range, but the serving contract guarantees it.
    pub fn new(is_fraud: bool, probability: f64) -> Self {
        Self {
            is_fraud,
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

/// A loaded, ready-to-predict fraud model.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError>;
}
