//! HTTP client for the Feast feature server.
//!
//! The feature server speaks columnar JSON: requests carry entity keys as
//! parallel arrays, responses carry one result column per feature. This
//! module reshapes both sides so the rest of the service works with rows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FeatureStoreError;

/// One entity row: join key name to value, e.g. `{"trans_num": "txn_1"}`.
pub type EntityRow = HashMap<String, serde_json::Value>;

/// One result row: feature name to value, only features the store actually
/// had a present value for.
pub type FeatureRow = HashMap<String, serde_json::Value>;

/// An entity row with the point-in-time timestamp for historical joins.
#[derive(Debug, Clone)]
pub struct HistoricalEntityRow {
    pub keys: EntityRow,
    pub event_timestamp: DateTime<Utc>,
}

/// What to retrieve: a named feature service, or an explicit feature list.
#[derive(Debug, Clone)]
pub enum FeatureSelection {
    Service(String),
    Features(Vec<String>),
}

/// Transport seam for the feature server. The adapter holds this as a
/// trait object so tests can swap in an in-memory server.
#[async_trait]
pub trait FeatureServerClient: Send + Sync {
    async fn get_online_features(
        &self,
        selection: &FeatureSelection,
        entity_rows: &[EntityRow],
    ) -> Result<Vec<FeatureRow>, FeatureStoreError>;

    async fn get_historical_features(
        &self,
        selection: &FeatureSelection,
        entity_rows: &[HistoricalEntityRow],
    ) -> Result<Vec<FeatureRow>, FeatureStoreError>;

    async fn materialize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), FeatureStoreError>;
}

/// Production client over HTTP.
pub struct HttpFeatureServer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFeatureServer {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_features(
        &self,
        path: &str,
        body: &FeaturesRequestBody,
        row_count: usize,
    ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(FeatureStoreError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(FeatureStoreError::Unreachable(format!(
                    "feature server returned {}: {}",
                    status, detail
                )));
            }
            return Err(FeatureStoreError::Malformed(format!(
                "feature server rejected request ({}): {}",
                status, detail
            )));
        }

        let body: FeaturesResponseBody = response
            .json()
            .await
            .map_err(FeatureStoreError::from_transport)?;

        rows_from_response(body, row_count)
    }
}

#[async_trait]
impl FeatureServerClient for HttpFeatureServer {
    async fn get_online_features(
        &self,
        selection: &FeatureSelection,
        entity_rows: &[EntityRow],
    ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
        let body = FeaturesRequestBody::new(selection, columnar_entities(entity_rows), None);
        debug!(rows = entity_rows.len(), "Fetching online features");
        self.post_features("get-online-features", &body, entity_rows.len())
            .await
    }

    async fn get_historical_features(
        &self,
        selection: &FeatureSelection,
        entity_rows: &[HistoricalEntityRow],
    ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
        let keys: Vec<EntityRow> = entity_rows.iter().map(|r| r.keys.clone()).collect();
        let timestamps: Vec<String> = entity_rows
            .iter()
            .map(|r| r.event_timestamp.to_rfc3339())
            .collect();
        let body =
            FeaturesRequestBody::new(selection, columnar_entities(&keys), Some(timestamps));
        debug!(rows = entity_rows.len(), "Fetching historical features");
        self.post_features("get-historical-features", &body, entity_rows.len())
            .await
    }

    async fn materialize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), FeatureStoreError> {
        let response = self
            .http
            .post(format!("{}/materialize", self.base_url))
            .json(&serde_json::json!({
                "start_ts": start.to_rfc3339(),
                "end_ts": end.to_rfc3339(),
            }))
            .send()
            .await
            .map_err(FeatureStoreError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FeatureStoreError::Unreachable(format!(
                "materialize failed ({}): {}",
                status, detail
            )));
        }
        Ok(())
    }
}

/// Row dicts to the columnar `{join_key: [values...]}` shape the server
/// expects.
fn columnar_entities(rows: &[EntityRow]) -> HashMap<String, Vec<serde_json::Value>> {
    let mut columns: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
    for row in rows {
        for (key, value) in row {
            columns.entry(key.clone()).or_default().push(value.clone());
        }
    }
    columns
}

#[derive(Debug, Serialize)]
struct FeaturesRequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Vec<String>>,
    entities: HashMap<String, Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_timestamps: Option<Vec<String>>,
}

impl FeaturesRequestBody {
    fn new(
        selection: &FeatureSelection,
        entities: HashMap<String, Vec<serde_json::Value>>,
        event_timestamps: Option<Vec<String>>,
    ) -> Self {
        let (feature_service, features) = match selection {
            FeatureSelection::Service(name) => (Some(name.clone()), None),
            FeatureSelection::Features(list) => (None, Some(list.clone())),
        };
        Self {
            feature_service,
            features,
            entities,
            event_timestamps,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeaturesResponseBody {
    metadata: ResponseMetadata,
    results: Vec<ResultColumn>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    feature_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultColumn {
    values: Vec<serde_json::Value>,
    #[serde(default)]
    statuses: Vec<String>,
}

/// Transpose the columnar response into per-entity rows. Features whose
/// status is not PRESENT are left out of the row, which downstream treats
/// as a per-feature miss.
fn rows_from_response(
    body: FeaturesResponseBody,
    row_count: usize,
) -> Result<Vec<FeatureRow>, FeatureStoreError> {
    if body.results.len() != body.metadata.feature_names.len() {
        return Err(FeatureStoreError::Malformed(format!(
            "{} feature names but {} result columns",
            body.metadata.feature_names.len(),
            body.results.len()
        )));
    }

    let mut rows: Vec<FeatureRow> = vec![HashMap::new(); row_count];
    for (name, column) in body.metadata.feature_names.iter().zip(&body.results) {
        if column.values.len() != row_count {
            return Err(FeatureStoreError::Malformed(format!(
                "feature '{}' has {} values for {} entities",
                name,
                column.values.len(),
                row_count
            )));
        }
        for (j, value) in column.values.iter().enumerate() {
            let present = column
                .statuses
                .get(j)
                .map(|s| s == "PRESENT")
                .unwrap_or(true);
            if present && !value.is_null() {
                rows[j].insert(name.clone(), value.clone());
            }
        }
    }

    if row_count > 0 && rows.iter().all(|r| r.is_empty()) {
        return Err(FeatureStoreError::EntityNotFound(
            "no present feature values for any requested entity".to_string(),
        ));
    }

    Ok(rows)
}
