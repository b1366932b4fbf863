//! MLflow tracking server client.
//!
//! Talks to the MLflow REST API (`/api/2.0/mlflow/...`) for model-version
//! and run metadata. Artifact loading happens separately, from the local
//! artifact paths the file-backed tracking store records.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::RegistryError;

/// A registered model version as reported by the registry.
#[derive(Debug, Clone)]
pub struct RegisteredVersion {
    pub version: u32,
    pub run_id: String,
    /// Artifact root of the version (local path or file:// URI)
    pub source: String,
}

/// Minimal run metadata used by the resolver fallback.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub artifact_uri: String,
}

/// Registry operations the model resolver depends on.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// All registered versions of a model, unordered.
    async fn list_versions(&self, name: &str) -> Result<Vec<RegisteredVersion>, RegistryError>;

    /// A specific registered version; `VersionNotFound` when absent.
    async fn get_version(&self, name: &str, version: u32)
        -> Result<RegisteredVersion, RegistryError>;

    /// Most recently started run of an experiment, if any.
    async fn latest_run(&self, experiment: &str) -> Result<Option<RunInfo>, RegistryError>;
}

/// REST client for an MLflow tracking server.
pub struct MlflowClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlflowClient {
    pub fn new(tracking_uri: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: tracking_uri.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, path)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| status.to_string());
        Err(RegistryError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ModelRegistry for MlflowClient {
    async fn list_versions(&self, name: &str) -> Result<Vec<RegisteredVersion>, RegistryError> {
        let response = self
            .http
            .get(self.endpoint("model-versions/search"))
            .query(&[("filter", format!("name='{}'", name))])
            .send()
            .await?;

        let body: SearchVersionsResponse = self.check(response).await?.json().await?;
        Ok(body
            .model_versions
            .into_iter()
            .filter_map(|v| v.into_registered(name))
            .collect())
    }

    async fn get_version(
        &self,
        name: &str,
        version: u32,
    ) -> Result<RegisteredVersion, RegistryError> {
        let response = self
            .http
            .get(self.endpoint("model-versions/get"))
            .query(&[("name", name), ("version", &version.to_string())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }

        let body: GetVersionResponse = self.check(response).await?.json().await?;
        body.model_version
            .into_registered(name)
            .ok_or(RegistryError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }

    async fn latest_run(&self, experiment: &str) -> Result<Option<RunInfo>, RegistryError> {
        let response = self
            .http
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", experiment)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::ExperimentNotFound(experiment.to_string()));
        }

        let body: GetExperimentResponse = self.check(response).await?.json().await?;

        let response = self
            .http
            .post(self.endpoint("runs/search"))
            .json(&serde_json::json!({
                "experiment_ids": [body.experiment.experiment_id],
                "order_by": ["start_time DESC"],
                "max_results": 1,
            }))
            .send()
            .await?;

        let body: SearchRunsResponse = self.check(response).await?.json().await?;
        Ok(body.runs.into_iter().next().map(|r| RunInfo {
            run_id: r.info.run_id,
            artifact_uri: r.info.artifact_uri,
        }))
    }
}

// Wire types for the MLflow REST responses.

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersionBody>,
}

#[derive(Debug, Deserialize)]
struct GetVersionResponse {
    model_version: ModelVersionBody,
}

#[derive(Debug, Deserialize)]
struct ModelVersionBody {
    /// MLflow reports versions as strings
    version: String,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    source: String,
}

impl ModelVersionBody {
    fn into_registered(self, name: &str) -> Option<RegisteredVersion> {
        match self.version.parse::<u32>() {
            Ok(version) => Some(RegisteredVersion {
                version,
                run_id: self.run_id,
                source: self.source,
            }),
            Err(_) => {
                warn!(model = %name, version = %self.version, "Skipping non-numeric model version");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentBody,
}

#[derive(Debug, Deserialize)]
struct ExperimentBody {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<RunBody>,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    info: RunInfoBody,
}

#[derive(Debug, Deserialize)]
struct RunInfoBody {
    run_id: String,
    #[serde(default)]
    artifact_uri: String,
}
