//! Startup model resolution.
//!
//! Selects which trained artifact to serve and loads it, with a defined
//! fallback order:
//!
//! - `auto`/`latest`: highest registered version of the canonical model;
//!   if the registry lookup or the load fails, the most recently started
//!   run of the configured experiment.
//! - explicit version: that exact version or nothing. A missing version is
//!   a resolution error, never a silent fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::MlflowConfig;
use crate::error::{ModelError, RegistryError, ResolveError};
use crate::models::{Classifier, OnnxClassifier};
use crate::registry::client::ModelRegistry;

/// Parsed `MODEL_VERSION` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Auto,
    Explicit(u32),
}

impl VersionSelector {
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        match raw {
            "auto" | "latest" => Ok(VersionSelector::Auto),
            other => other
                .parse::<u32>()
                .map(VersionSelector::Explicit)
                .map_err(|_| ResolveError::InvalidSelector(other.to_string())),
        }
    }
}

/// A resolved, ready-to-predict model with its human-readable version label.
pub struct ResolvedModel {
    pub classifier: Arc<dyn Classifier>,
    pub version_label: String,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("version_label", &self.version_label)
            .finish_non_exhaustive()
    }
}

/// Loads a classifier from an artifact path. Seam between version selection
/// (registry metadata) and ONNX Runtime.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelError>;
}

/// Production loader backed by ONNX Runtime.
pub struct OnnxLoader {
    pub onnx_threads: usize,
}

impl ArtifactLoader for OnnxLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
        Ok(Arc::new(OnnxClassifier::load(path, self.onnx_threads)?))
    }
}

/// Resolve and load the model to serve. Runs exactly once at startup; any
/// error here is fatal and the process must not begin serving.
pub async fn resolve(
    registry: &dyn ModelRegistry,
    loader: &dyn ArtifactLoader,
    cfg: &MlflowConfig,
) -> Result<ResolvedModel, ResolveError> {
    let selector = VersionSelector::parse(&cfg.model_version)?;

    match selector {
        VersionSelector::Explicit(version) => {
            info!(model = %cfg.model_name, version, "Loading explicit model version");
            let registered = registry.get_version(&cfg.model_name, version).await?;
            let classifier = loader.load(&artifact_model_path(&registered.source))?;
            let version_label = format!("{}/v{}", cfg.model_name, version);
            info!(version = %version_label, "Model loaded");
            Ok(ResolvedModel {
                classifier,
                version_label,
            })
        }
        VersionSelector::Auto => match load_latest_registered(registry, loader, cfg).await {
            Ok(model) => Ok(model),
            Err(e) => {
                warn!(error = %e, "Could not load registered model, trying latest run");
                load_latest_run(registry, loader, cfg).await
            }
        },
    }
}

/// Primary auto path: highest registered version.
async fn load_latest_registered(
    registry: &dyn ModelRegistry,
    loader: &dyn ArtifactLoader,
    cfg: &MlflowConfig,
) -> Result<ResolvedModel, ResolveError> {
    let versions = registry.list_versions(&cfg.model_name).await?;
    let latest = versions
        .into_iter()
        .max_by_key(|v| v.version)
        .ok_or_else(|| RegistryError::NoVersions(cfg.model_name.clone()))?;

    info!(
        model = %cfg.model_name,
        version = latest.version,
        "Auto-selected highest registered version"
    );

    let classifier = loader.load(&artifact_model_path(&latest.source))?;
    Ok(ResolvedModel {
        classifier,
        version_label: format!("{}/v{}", cfg.model_name, latest.version),
    })
}

/// Fallback auto path: artifact of the most recently started run.
async fn load_latest_run(
    registry: &dyn ModelRegistry,
    loader: &dyn ArtifactLoader,
    cfg: &MlflowConfig,
) -> Result<ResolvedModel, ResolveError> {
    let run = registry
        .latest_run(&cfg.experiment)
        .await?
        .ok_or_else(|| ResolveError::NoCandidates {
            model: cfg.model_name.clone(),
            experiment: cfg.experiment.clone(),
        })?;

    info!(run_id = %run.run_id, "Loading model from latest experiment run");

    let root = format!("{}/model", run.artifact_uri);
    let classifier = loader.load(&artifact_model_path(&root))?;
    let short_id: String = run.run_id.chars().take(8).collect();
    Ok(ResolvedModel {
        classifier,
        version_label: format!("run/{}", short_id),
    })
}

/// Map an artifact root (local path or file:// URI) to the ONNX file inside
/// the logged model directory.
fn artifact_model_path(artifact_root: &str) -> PathBuf {
    let root = artifact_root
        .strip_prefix("file://")
        .unwrap_or(artifact_root);
    Path::new(root).join("model.onnx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::features::FeatureVector;
    use crate::models::Prediction;
    use crate::registry::client::{RegisteredVersion, RunInfo};
    use async_trait::async_trait;

    struct StubClassifier;

    impl Classifier for StubClassifier {
        fn predict(&self, _features: &FeatureVector) -> Result<Prediction, ModelError> {
            Ok(Prediction::new(false, 0.1))
        }
    }

    struct StubLoader {
        fail: bool,
    }

    impl ArtifactLoader for StubLoader {
        fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
            if self.fail {
                Err(ModelError::ArtifactMissing(path.display().to_string()))
            } else {
                Ok(Arc::new(StubClassifier))
            }
        }
    }

    struct FakeRegistry {
        versions: Vec<u32>,
        list_fails: bool,
        run: Option<RunInfo>,
    }

    #[async_trait]
    impl ModelRegistry for FakeRegistry {
        async fn list_versions(
            &self,
            name: &str,
        ) -> Result<Vec<RegisteredVersion>, RegistryError> {
            if self.list_fails {
                return Err(RegistryError::Api {
                    status: 500,
                    message: "registry down".to_string(),
                });
            }
            Ok(self
                .versions
                .iter()
                .map(|&version| RegisteredVersion {
                    version,
                    run_id: format!("run-{}", version),
                    source: format!("mlruns/1/{}/artifacts/{}", version, name),
                })
                .collect())
        }

        async fn get_version(
            &self,
            name: &str,
            version: u32,
        ) -> Result<RegisteredVersion, RegistryError> {
            if self.list_fails || !self.versions.contains(&version) {
                return Err(RegistryError::VersionNotFound {
                    name: name.to_string(),
                    version,
                });
            }
            Ok(RegisteredVersion {
                version,
                run_id: format!("run-{}", version),
                source: format!("mlruns/1/{}/artifacts/{}", version, name),
            })
        }

        async fn latest_run(&self, _experiment: &str) -> Result<Option<RunInfo>, RegistryError> {
            Ok(self.run.clone())
        }
    }

    fn cfg(selector: &str) -> MlflowConfig {
        MlflowConfig {
            tracking_uri: "http://localhost:5000".to_string(),
            model_name: "fraud_detector".to_string(),
            experiment: "fraud_detection".to_string(),
            model_version: selector.to_string(),
            onnx_threads: 1,
        }
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!(VersionSelector::parse("auto").unwrap(), VersionSelector::Auto);
        assert_eq!(
            VersionSelector::parse("latest").unwrap(),
            VersionSelector::Auto
        );
        assert_eq!(
            VersionSelector::parse("3").unwrap(),
            VersionSelector::Explicit(3)
        );
        assert!(matches!(
            VersionSelector::parse("staging"),
            Err(ResolveError::InvalidSelector(_))
        ));
    }

    #[tokio::test]
    async fn test_auto_selects_highest_version() {
        let registry = FakeRegistry {
            versions: vec![1, 2, 5],
            list_fails: false,
            run: None,
        };
        let loader = StubLoader { fail: false };

        let model = resolve(&registry, &loader, &cfg("auto")).await.unwrap();
        assert_eq!(model.version_label, "fraud_detector/v5");
    }

    #[tokio::test]
    async fn test_explicit_missing_version_is_fatal() {
        let registry = FakeRegistry {
            versions: vec![1, 2, 5],
            list_fails: false,
            // A fallback run exists, but explicit selection must not use it.
            run: Some(RunInfo {
                run_id: "1a2b3c4d5e6f".to_string(),
                artifact_uri: "mlruns/1/1a2b3c4d5e6f/artifacts".to_string(),
            }),
        };
        let loader = StubLoader { fail: false };

        let err = resolve(&registry, &loader, &cfg("3")).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Registry(RegistryError::VersionNotFound { version: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_explicit_version_loads() {
        let registry = FakeRegistry {
            versions: vec![1, 2, 5],
            list_fails: false,
            run: None,
        };
        let loader = StubLoader { fail: false };

        let model = resolve(&registry, &loader, &cfg("2")).await.unwrap();
        assert_eq!(model.version_label, "fraud_detector/v2");
    }

    #[tokio::test]
    async fn test_registry_failure_falls_back_to_latest_run() {
        let registry = FakeRegistry {
            versions: vec![],
            list_fails: true,
            run: Some(RunInfo {
                run_id: "1a2b3c4d5e6f".to_string(),
                artifact_uri: "mlruns/1/1a2b3c4d5e6f/artifacts".to_string(),
            }),
        };
        let loader = StubLoader { fail: false };

        let model = resolve(&registry, &loader, &cfg("auto")).await.unwrap();
        assert_eq!(model.version_label, "run/1a2b3c4d");
    }

    #[tokio::test]
    async fn test_no_versions_falls_back_to_latest_run() {
        let registry = FakeRegistry {
            versions: vec![],
            list_fails: false,
            run: Some(RunInfo {
                run_id: "feedbeefcafe".to_string(),
                artifact_uri: "mlruns/1/feedbeefcafe/artifacts".to_string(),
            }),
        };
        let loader = StubLoader { fail: false };

        let model = resolve(&registry, &loader, &cfg("auto")).await.unwrap();
        assert_eq!(model.version_label, "run/feedbeef");
    }

    #[tokio::test]
    async fn test_both_paths_exhausted_is_fatal() {
        let registry = FakeRegistry {
            versions: vec![],
            list_fails: false,
            run: None,
        };
        let loader = StubLoader { fail: false };

        let err = resolve(&registry, &loader, &cfg("auto")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCandidates { .. }));
    }

    #[tokio::test]
    async fn test_load_failure_in_auto_mode_tries_run_fallback() {
        let registry = FakeRegistry {
            versions: vec![1],
            list_fails: false,
            run: None,
        };
        // Artifact load always fails and no run exists either.
        let loader = StubLoader { fail: true };

        let err = resolve(&registry, &loader, &cfg("auto")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCandidates { .. }));
    }

    #[test]
    fn test_artifact_path_strips_file_scheme() {
        let path = artifact_model_path("file:///srv/mlruns/1/abc/artifacts/model");
        assert_eq!(
            path,
            PathBuf::from("/srv/mlruns/1/abc/artifacts/model/model.onnx")
        );
    }
}
