//! Typed errors for the registry, feature store, and prediction paths.

use thiserror::Error;

/// Errors from the MLflow registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model version {version} of '{name}' not registered")]
    VersionNotFound { name: String, version: u32 },

    #[error("no registered versions found for model '{0}'")]
    NoVersions(String),

    #[error("experiment '{0}' not found")]
    ExperimentNotFound(String),
}

/// Errors from model artifact loading and inference.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("ONNX runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("model artifact not found at {0}")]
    ArtifactMissing(String),

    #[error("model output '{0}' missing or not extractable")]
    MissingOutput(String),

    #[error("model session lock poisoned")]
    LockPoisoned,
}

/// Errors from the startup model resolution sequence. All variants are
/// startup-fatal: the process must not begin serving without a model.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid MODEL_VERSION selector '{0}' (expected a number, \"auto\" or \"latest\")")]
    InvalidSelector(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no registered versions and no runs found for '{model}' / experiment '{experiment}'")]
    NoCandidates { model: String, experiment: String },
}

/// Errors from the feature store adapter.
///
/// The split matters for the prediction fallback policy: `Unreachable` and
/// `EntityNotFound` degrade to request-supplied features, while `Malformed`
/// and `UnknownService` surface to the caller.
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    #[error("feature server unreachable: {0}")]
    Unreachable(String),

    #[error("no online features found for entity '{0}'")]
    EntityNotFound(String),

    #[error("malformed feature server response: {0}")]
    Malformed(String),

    #[error("unknown feature service '{0}'")]
    UnknownService(String),

    #[error("invalid ISO-8601 date '{input}': {source}")]
    InvalidDate {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("feature repository config error: {0}")]
    RepoConfig(String),
}

impl FeatureStoreError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeatureStoreError::Malformed(err.to_string())
        } else {
            FeatureStoreError::Unreachable(err.to_string())
        }
    }

    /// Whether the prediction path may degrade to request-supplied features.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            FeatureStoreError::Unreachable(_) | FeatureStoreError::EntityNotFound(_)
        )
    }
}

/// Errors surfaced to the caller of a prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("inference failed: {0}")]
    Inference(#[from] ModelError),

    #[error("feature lookup failed: {0}")]
    Features(#[from] FeatureStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        assert!(FeatureStoreError::Unreachable("refused".into()).is_fallback_eligible());
        assert!(FeatureStoreError::EntityNotFound("txn_1".into()).is_fallback_eligible());
        assert!(!FeatureStoreError::Malformed("bad json".into()).is_fallback_eligible());
        assert!(!FeatureStoreError::UnknownService("v2".into()).is_fallback_eligible());
    }
}
