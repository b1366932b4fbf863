//! Fraud Detection API
//!
//! A serving layer wiring an MLflow model registry, a Feast feature store,
//! and an HTTP API around a fraud-detection classifier. Model resolution
//! runs once at startup; predictions use request-supplied features or
//! online feature lookups with per-feature fallback.

pub mod api;
pub mod config;
pub mod error;
pub mod feature_store;
pub mod features;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use feature_store::FeatureStoreAdapter;
pub use service::PredictionService;
pub use types::{HealthResponse, PredictionResponse, TransactionRequest};
