//! Prediction service: turns validated transaction requests into fraud
//! decisions, in direct mode or feature-store mode.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::PredictError;
use crate::feature_store::{EntityRow, FeatureStoreAdapter};
use crate::features::FeatureVector;
use crate::metrics::ServiceMetrics;
use crate::models::Classifier;
use crate::types::{PredictionResponse, TransactionRequest};

pub struct PredictionService {
    classifier: Arc<dyn Classifier>,
    model_version: String,
    metrics: Arc<ServiceMetrics>,
}

impl PredictionService {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        model_version: String,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            classifier,
            model_version,
            metrics,
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Direct mode: features assembled solely from the request.
    pub fn predict(&self, tx: &TransactionRequest) -> Result<PredictionResponse, PredictError> {
        let features = FeatureVector::from_request(tx);
        self.run_model(tx, &features)
    }

    /// Feature-store mode: resolve feature values by transaction id, with
    /// per-feature fallback to request values. A lookup that fails because
    /// the store is unreachable or the entity is unknown degrades to direct
    /// features; a malformed response is a real error and surfaces.
    pub async fn predict_with_store(
        &self,
        tx: &TransactionRequest,
        store: &FeatureStoreAdapter,
    ) -> Result<PredictionResponse, PredictError> {
        let entity = EntityRow::from([("trans_num".to_string(), json!(tx.trans_num))]);

        let features = match store.get_online_features(&[entity], None).await {
            Ok(rows) => {
                let row = rows.into_iter().next().unwrap_or_default();
                let (features, missing) = FeatureVector::from_online_row(tx, &row);
                if !missing.is_empty() {
                    debug!(
                        trans_num = %tx.trans_num,
                        missing = ?missing,
                        "Online lookup incomplete, filling from request"
                    );
                }
                features
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(
                    trans_num = %tx.trans_num,
                    error = %e,
                    "Feast lookup failed, using request data"
                );
                self.metrics.record_fallback();
                FeatureVector::from_request(tx)
            }
            Err(e) => return Err(PredictError::Features(e)),
        };

        self.run_model(tx, &features)
    }

    fn run_model(
        &self,
        tx: &TransactionRequest,
        features: &FeatureVector,
    ) -> Result<PredictionResponse, PredictError> {
        let prediction = self.classifier.predict(features)?;

        Ok(PredictionResponse {
            trans_num: tx.trans_num.clone(),
            is_fraud: prediction.is_fraud,
            fraud_probability: prediction.probability,
            model_version: self.model_version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FeatureStoreError, ModelError};
    use crate::feature_store::client::{
        FeatureRow, FeatureSelection, FeatureServerClient, HistoricalEntityRow,
    };
    use crate::models::Prediction;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Order-sensitive scorer: distinct per-slot weights, so swapped columns
    /// produce different probabilities. Records the last feature vector.
    struct WeightedClassifier {
        last_features: Mutex<Option<Vec<f32>>>,
    }

    impl WeightedClassifier {
        fn new() -> Self {
            Self {
                last_features: Mutex::new(None),
            }
        }
    }

    impl Classifier for WeightedClassifier {
        fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
            let v = features.as_slice();
            *self.last_features.lock().unwrap() = Some(v.to_vec());
            let score: f32 = v
                .iter()
                .enumerate()
                .map(|(i, x)| x * (i as f32 + 1.0) * 1e-6)
                .sum();
            let probability = (score as f64).clamp(0.0, 1.0);
            Ok(Prediction::new(probability >= 0.5, probability))
        }
    }

    enum StoreBehavior {
        Rows(Vec<FeatureRow>),
        Fail(fn() -> FeatureStoreError),
    }

    struct StubClient {
        behavior: StoreBehavior,
    }

    #[async_trait]
    impl FeatureServerClient for StubClient {
        async fn get_online_features(
            &self,
            _selection: &FeatureSelection,
            _entity_rows: &[EntityRow],
        ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
            match &self.behavior {
                StoreBehavior::Rows(rows) => Ok(rows.clone()),
                StoreBehavior::Fail(make) => Err(make()),
            }
        }

        async fn get_historical_features(
            &self,
            _selection: &FeatureSelection,
            _entity_rows: &[HistoricalEntityRow],
        ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
            Ok(Vec::new())
        }

        async fn materialize(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<(), FeatureStoreError> {
            Ok(())
        }
    }

    fn store_with(behavior: StoreBehavior) -> FeatureStoreAdapter {
        FeatureStoreAdapter::with_client(
            "feature_store",
            "fraud_detection",
            Box::new(StubClient { behavior }),
        )
    }

    fn request() -> TransactionRequest {
        TransactionRequest {
            trans_num: "txn_1".to_string(),
            cc_num: "4111".to_string(),
            merchant: "Acme".to_string(),
            amt: 49.99,
            city_pop: 50000,
            category_encoded: 8,
            gender_encoded: 1,
            state_encoded: 5,
        }
    }

    fn service() -> (PredictionService, Arc<ServiceMetrics>) {
        let metrics = Arc::new(ServiceMetrics::new());
        let service = PredictionService::new(
            Arc::new(WeightedClassifier::new()),
            "fraud_detector/v5".to_string(),
            metrics.clone(),
        );
        (service, metrics)
    }

    #[test]
    fn test_direct_prediction() {
        let (service, _) = service();
        let resp = service.predict(&request()).unwrap();

        assert_eq!(resp.trans_num, "txn_1");
        assert_eq!(resp.model_version, "fraud_detector/v5");
        assert!((0.0..=1.0).contains(&resp.fraud_probability));
        assert_eq!(resp.is_fraud, resp.fraud_probability >= 0.5);
    }

    #[test]
    fn test_swapped_request_fields_change_score() {
        let (service, _) = service();
        let base = service.predict(&request()).unwrap();

        let mut swapped = request();
        // amt and state_encoded trade places
        swapped.state_encoded = 49;
        swapped.amt = 5.0;
        let other = service.predict(&swapped).unwrap();

        assert_ne!(base.fraud_probability, other.fraud_probability);
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_request() {
        let (service, metrics) = service();
        let store = store_with(StoreBehavior::Fail(|| {
            FeatureStoreError::Unreachable("connection refused".to_string())
        }));

        let resp = service.predict_with_store(&request(), &store).await.unwrap();
        assert_eq!(resp.trans_num, "txn_1");
        assert_eq!(
            metrics
                .feast_fallbacks
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );

        // Same score as direct mode: the full vector fell back.
        let direct = service.predict(&request()).unwrap();
        assert_eq!(resp.fraud_probability, direct.fraud_probability);
    }

    #[tokio::test]
    async fn test_entity_not_found_falls_back() {
        let (service, _) = service();
        let store = store_with(StoreBehavior::Fail(|| {
            FeatureStoreError::EntityNotFound("txn_1".to_string())
        }));

        assert!(service.predict_with_store(&request(), &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_response_surfaces() {
        let (service, _) = service();
        let store = store_with(StoreBehavior::Fail(|| {
            FeatureStoreError::Malformed("2 columns for 5 names".to_string())
        }));

        let err = service
            .predict_with_store(&request(), &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PredictError::Features(FeatureStoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_row_merges_per_feature() {
        use serde_json::json;

        let classifier = Arc::new(WeightedClassifier::new());
        let metrics = Arc::new(ServiceMetrics::new());
        let service = PredictionService::new(
            classifier.clone(),
            "fraud_detector/v5".to_string(),
            metrics,
        );

        // Lookup has everything except state_encoded.
        let row = FeatureRow::from([
            ("amt".to_string(), json!(12.5)),
            ("city_pop".to_string(), json!(100)),
            ("category_encoded".to_string(), json!(3)),
            ("gender_encoded".to_string(), json!(0)),
        ]);
        let store = store_with(StoreBehavior::Rows(vec![row]));

        service.predict_with_store(&request(), &store).await.unwrap();

        let seen = classifier.last_features.lock().unwrap().clone().unwrap();
        // state_encoded (last slot) comes from the request, rest from the store.
        assert_eq!(seen, vec![12.5, 100.0, 3.0, 0.0, 5.0]);
    }
}
