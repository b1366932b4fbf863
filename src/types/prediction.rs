//! Prediction and health response schemas

use serde::{Deserialize, Serialize};

/// Fraud scoring result returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Transaction identifier echoed from the request
    pub trans_num: String,

    /// Binary fraud decision from the model
    pub is_fraud: bool,

    /// Calibrated fraud probability, clamped to [0, 1]
    pub fraud_probability: f64,

    /// Label of the model that produced the prediction,
    /// e.g. `fraud_detector/v5` or `run/1a2b3c4d`
    pub model_version: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when a model is loaded, "unhealthy" otherwise
    pub status: String,
    pub mlflow_connected: bool,
    pub feast_connected: bool,
    pub model_loaded: bool,
}

impl HealthResponse {
    pub fn new(model_loaded: bool, feast_connected: bool) -> Self {
        Self {
            status: if model_loaded { "healthy" } else { "unhealthy" }.to_string(),
            mlflow_connected: true,
            feast_connected,
            model_loaded,
        }
    }
}
