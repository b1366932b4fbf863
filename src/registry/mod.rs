//! MLflow model registry integration

pub mod client;
pub mod resolver;

pub use client::{MlflowClient, ModelRegistry, RegisteredVersion, RunInfo};
pub use resolver::{resolve, ArtifactLoader, OnnxLoader, ResolvedModel, VersionSelector};
