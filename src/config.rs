//! Configuration management for the fraud detection API

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mlflow: MlflowConfig,
    pub feast: FeastConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

/// MLflow registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MlflowConfig {
    /// Base URL of the MLflow tracking server REST API
    pub tracking_uri: String,
    /// Registered model name to resolve at startup
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Experiment searched by the run fallback path
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Version selector: explicit number, "auto" or "latest".
    /// Overridden by the MODEL_VERSION environment variable.
    #[serde(default = "default_model_version")]
    pub model_version: String,
    /// Number of intra-op threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

/// Feast feature store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeastConfig {
    /// Path to the feature repository (contains feature_store.yaml)
    pub repo_path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

fn default_model_name() -> String {
    "fraud_detector".to_string()
}

fn default_experiment() -> String {
    "fraud_detection".to_string()
}

fn default_model_version() -> String {
    "auto".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl AppConfig {
    /// Load configuration from the default path and apply env overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let mut config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // MODEL_VERSION beats the file selector
        if let Ok(version) = std::env::var("MODEL_VERSION") {
            if !version.is_empty() {
                config.mlflow.model_version = version;
            }
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            mlflow: MlflowConfig {
                tracking_uri: "http://127.0.0.1:5000".to_string(),
                model_name: default_model_name(),
                experiment: default_experiment(),
                model_version: default_model_version(),
                onnx_threads: default_onnx_threads(),
            },
            feast: FeastConfig {
                repo_path: "feature_store".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
