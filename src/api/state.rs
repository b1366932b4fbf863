//! Application state shared by the request handlers.
//!
//! The model and feature-store handles are populated exactly once during
//! startup and read-only afterwards, so handlers need no locking.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::feature_store::FeatureStoreAdapter;
use crate::metrics::ServiceMetrics;
use crate::service::PredictionService;

pub struct AppState {
    service: OnceCell<Arc<PredictionService>>,
    feature_store: OnceCell<Arc<FeatureStoreAdapter>>,
    metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            service: OnceCell::new(),
            feature_store: OnceCell::new(),
            metrics,
        }
    }

    /// Install the resolved model. Startup calls this once; a second call
    /// is a programming error.
    pub fn set_service(&self, service: Arc<PredictionService>) {
        if self.service.set(service).is_err() {
            tracing::error!("Prediction service installed twice, keeping first");
        }
    }

    pub fn set_feature_store(&self, store: Arc<FeatureStoreAdapter>) {
        if self.feature_store.set(store).is_err() {
            tracing::error!("Feature store installed twice, keeping first");
        }
    }

    pub fn service(&self) -> Option<&Arc<PredictionService>> {
        self.service.get()
    }

    pub fn feature_store(&self) -> Option<&Arc<FeatureStoreAdapter>> {
        self.feature_store.get()
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(ServiceMetrics::new()))
    }
}
