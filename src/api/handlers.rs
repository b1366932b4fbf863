//! HTTP handlers for the fraud detection API.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::Validate;

use crate::error::PredictError;
use crate::types::{HealthResponse, PredictionResponse, TransactionRequest};

use super::state::AppState;

/// Caller-visible request failures, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unavailable(&'static str),

    #[error("{0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Root endpoint: static service metadata.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Fraud Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "predict": "/predict",
            "predict_with_feast": "/predict/with-feast",
        }
    }))
}

/// Health check. Never fails; reports dependency readiness.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        state.service().is_some(),
        state.feature_store().is_some(),
    ))
}

/// Direct-mode prediction: features from the request body only.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(transaction): Json<TransactionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    transaction.validate()?;

    let service = state
        .service()
        .ok_or(ApiError::Unavailable("Model not loaded"))?;

    let start = Instant::now();
    match service.predict(&transaction) {
        Ok(response) => {
            state
                .metrics()
                .record_prediction(start.elapsed(), response.is_fraud);
            Ok(Json(response))
        }
        Err(e) => {
            error!(trans_num = %transaction.trans_num, error = %e, "Prediction error");
            state.metrics().record_failure();
            Err(e.into())
        }
    }
}

/// Feature-store-mode prediction: online lookup with fallback to request
/// values.
pub async fn predict_with_feast(
    State(state): State<Arc<AppState>>,
    Json(transaction): Json<TransactionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    transaction.validate()?;

    let service = state
        .service()
        .ok_or(ApiError::Unavailable("Model not loaded"))?;
    let store = state
        .feature_store()
        .ok_or(ApiError::Unavailable("Feature store not initialized"))?;

    let start = Instant::now();
    match service.predict_with_store(&transaction, store).await {
        Ok(response) => {
            state
                .metrics()
                .record_prediction(start.elapsed(), response.is_fraud);
            Ok(Json(response))
        }
        Err(e) => {
            error!(trans_num = %transaction.trans_num, error = %e, "Prediction error");
            state.metrics().record_failure();
            Err(e.into())
        }
    }
}
