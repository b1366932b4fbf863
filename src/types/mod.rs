//! Request and response types for the fraud detection API

pub mod prediction;
pub mod transaction;

pub use prediction::{HealthResponse, PredictionResponse};
pub use transaction::TransactionRequest;
