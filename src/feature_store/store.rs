//! Feature store adapter bound to a feature repository path.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::FeatureStoreError;
use crate::feature_store::client::{
    EntityRow, FeatureRow, FeatureSelection, FeatureServerClient, HistoricalEntityRow,
    HttpFeatureServer,
};
use crate::feature_store::definitions::FeatureRegistry;

/// Feature service used when a caller gives no explicit feature list.
pub const DEFAULT_FEATURE_SERVICE: &str = "fraud_detection_v1";

/// Minimal slice of `feature_store.yaml` this service needs.
#[derive(Debug, Deserialize)]
struct RepoConfig {
    project: String,
    feature_server: FeatureServerConfig,
}

#[derive(Debug, Deserialize)]
struct FeatureServerConfig {
    url: String,
}

/// Wraps the feature-server client together with the repository's static
/// definitions. Every call is a direct pass-through with light reshaping;
/// no caching, no retry.
pub struct FeatureStoreAdapter {
    repo_path: PathBuf,
    project: String,
    registry: FeatureRegistry,
    client: Box<dyn FeatureServerClient>,
}

impl FeatureStoreAdapter {
    /// Initialize from a repository path containing `feature_store.yaml`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, FeatureStoreError> {
        let repo_path = repo_path.as_ref().to_path_buf();
        let yaml_path = repo_path.join("feature_store.yaml");
        let raw = std::fs::read_to_string(&yaml_path).map_err(|e| {
            FeatureStoreError::RepoConfig(format!("cannot read {}: {}", yaml_path.display(), e))
        })?;
        let repo: RepoConfig = serde_yaml::from_str(&raw)
            .map_err(|e| FeatureStoreError::RepoConfig(e.to_string()))?;

        info!(
            project = %repo.project,
            feature_server = %repo.feature_server.url,
            "Feature store initialized"
        );

        Ok(Self {
            repo_path,
            project: repo.project,
            registry: FeatureRegistry::fraud_detection(),
            client: Box::new(HttpFeatureServer::new(&repo.feature_server.url)),
        })
    }

    /// Build an adapter over an arbitrary client. Test seam.
    pub fn with_client<P: AsRef<Path>>(
        repo_path: P,
        project: &str,
        client: Box<dyn FeatureServerClient>,
    ) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            project: project.to_string(),
            registry: FeatureRegistry::fraud_detection(),
            client,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Current feature values per entity. With no explicit list, the
    /// default feature service is used.
    pub async fn get_online_features(
        &self,
        entity_rows: &[EntityRow],
        features: Option<Vec<String>>,
    ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
        let selection = self.selection(features)?;
        self.client.get_online_features(&selection, entity_rows).await
    }

    /// Point-in-time joined feature values for training.
    pub async fn get_historical_features(
        &self,
        entity_rows: &[HistoricalEntityRow],
        features: Option<Vec<String>>,
    ) -> Result<Vec<FeatureRow>, FeatureStoreError> {
        let selection = self.selection(features)?;
        self.client
            .get_historical_features(&selection, entity_rows)
            .await
    }

    /// Materialize features into the online store for an ISO-8601 date
    /// range. Malformed dates fail before any network call.
    pub async fn materialize(&self, start: &str, end: &str) -> Result<(), FeatureStoreError> {
        let start = parse_iso_datetime(start)?;
        let end = parse_iso_datetime(end)?;
        self.client.materialize(start, end).await?;
        info!(start = %start, end = %end, "Materialized features to online store");
        Ok(())
    }

    pub fn list_feature_views(&self) -> Vec<String> {
        self.registry.feature_view_names()
    }

    pub fn list_feature_services(&self) -> Vec<String> {
        self.registry.feature_service_names()
    }

    /// Fully qualified `view:feature` names for a named service; unknown
    /// names are an error.
    pub fn get_feature_service_features(
        &self,
        service_name: &str,
    ) -> Result<Vec<String>, FeatureStoreError> {
        self.registry.service_features(service_name)
    }

    fn selection(
        &self,
        features: Option<Vec<String>>,
    ) -> Result<FeatureSelection, FeatureStoreError> {
        match features {
            Some(list) => Ok(FeatureSelection::Features(list)),
            None => {
                // Default service must exist in the definitions.
                self.registry.get_service(DEFAULT_FEATURE_SERVICE)?;
                Ok(FeatureSelection::Service(DEFAULT_FEATURE_SERVICE.to_string()))
            }
        }
    }
}

/// Strict ISO-8601 parsing: RFC 3339 datetime or plain date (midnight UTC).
fn parse_iso_datetime(input: &str) -> Result<DateTime<Utc>, FeatureStoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(NaiveTime::MIN).and_utc()),
        Err(source) => Err(FeatureStoreError::InvalidDate {
            input: input.to_string(),
            source,
        }),
    }
}
