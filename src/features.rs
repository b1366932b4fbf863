//! Feature vector assembly for model inference.
//!
//! Features must appear in the exact order the model was trained on,
//! regardless of whether a value comes from the request body or from a
//! feature-store lookup.

use std::collections::HashMap;

use crate::types::TransactionRequest;

/// Number of model input features.
pub const FEATURE_COUNT: usize = 5;

/// Model-trained feature order. Online lookup results are merged by these
/// names; do not reorder.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "amt",
    "city_pop",
    "category_encoded",
    "gender_encoded",
    "state_encoded",
];

/// Ordered tuple of the five numeric features fed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    /// Assemble the vector solely from request fields (direct mode).
    pub fn from_request(tx: &TransactionRequest) -> Self {
        Self([
            tx.amt as f32,
            tx.city_pop as f32,
            tx.category_encoded as f32,
            tx.gender_encoded as f32,
            tx.state_encoded as f32,
        ])
    }

    /// Assemble the vector from an online feature row, falling back to the
    /// request value for each feature individually when the lookup omitted
    /// it or returned a non-numeric value.
    ///
    /// Returns the vector and the names of features that fell back.
    pub fn from_online_row(
        tx: &TransactionRequest,
        row: &HashMap<String, serde_json::Value>,
    ) -> (Self, Vec<&'static str>) {
        let direct = Self::from_request(tx);
        let mut values = [0.0_f32; FEATURE_COUNT];
        let mut missing = Vec::new();

        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            match row.get(*name).and_then(|v| v.as_f64()) {
                Some(v) => values[i] = v as f32,
                None => {
                    values[i] = direct.0[i];
                    missing.push(*name);
                }
            }
        }

        (Self(values), missing)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}
