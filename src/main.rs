//! Fraud Detection API - Main Entry Point
//!
//! Resolves a model from the MLflow registry, connects the Feast feature
//! store, and serves predictions over HTTP.

use anyhow::{Context, Result};
use fraud_detection_api::{
    api::{self, AppState},
    config::AppConfig,
    feature_store::FeatureStoreAdapter,
    metrics::{MetricsReporter, ServiceMetrics},
    registry::{self, MlflowClient, OnnxLoader},
    service::PredictionService,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_detection_api=info".parse()?),
        )
        .init();

    info!("Starting Fraud Detection API");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        tracking_uri = %config.mlflow.tracking_uri,
        model = %config.mlflow.model_name,
        selector = %config.mlflow.model_version,
        "Configuration loaded"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    let state = Arc::new(AppState::new(metrics.clone()));

    // Resolve and load the model; failure here is fatal.
    let mlflow = MlflowClient::new(&config.mlflow.tracking_uri);
    let loader = OnnxLoader {
        onnx_threads: config.mlflow.onnx_threads,
    };
    let resolved = registry::resolve(&mlflow, &loader, &config.mlflow)
        .await
        .context("Model resolution failed, refusing to serve")?;
    info!(version = %resolved.version_label, "Model ready");

    state.set_service(Arc::new(PredictionService::new(
        resolved.classifier,
        resolved.version_label,
        metrics.clone(),
    )));

    // Feature store init is best-effort: without it, /predict/with-feast
    // answers 503 and everything else still works.
    match FeatureStoreAdapter::new(&config.feast.repo_path) {
        Ok(store) => state.set_feature_store(Arc::new(store)),
        Err(e) => {
            error!(
                repo_path = %config.feast.repo_path,
                error = %e,
                "Feature store initialization failed, feast mode disabled"
            );
        }
    }

    // Periodic metrics summary
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(reporter_metrics, 30);
        reporter.start().await;
    });

    let app = api::router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app).await?;

    warn!("Server stopped");
    Ok(())
}
