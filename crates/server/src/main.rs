//! Dropout prediction server
//!
//! Loads the classifier artifact once, then serves predictions, health,
//! readiness and metrics over HTTP.

use anyhow::Result;
use dropout_core::{
    health::HealthRegistry,
    observability::{ServiceMetrics, StructuredLogger},
    ModelState,
};
use dropout_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    init_tracing(config.log_json);

    let logger = StructuredLogger::new("dropout-server");
    logger.log_startup(SERVICE_VERSION, &config.model_path.display().to_string());

    let metrics = ServiceMetrics::new();

    let model_path = config.model_path.clone();
    let expected_sha256 = config.model_sha256.clone();
    let model = tokio::task::spawn_blocking(move || {
        ModelState::load(&model_path, expected_sha256.as_deref())
    })
    .await?;

    match &model {
        ModelState::Ready(bundle) => {
            let schema = bundle.schema();
            metrics.set_model_info(bundle.model_type(), schema.len());
            logger.log_model_loaded(bundle.model_type(), schema.len(), schema.class_labels());
        }
        ModelState::SchemaUnavailable { error, .. } => {
            logger.log_model_unavailable(&error.to_string());
        }
        ModelState::Unavailable { reason } => {
            logger.log_model_unavailable(reason);
        }
    }

    let health_registry = HealthRegistry::new();
    health_registry.record_model_state(&model).await;

    let app_state = Arc::new(api::AppState::new(
        model,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    let api_handle = tokio::spawn(api::serve(config.bind_addr(), app_state));
    health_registry.set_ready(true).await;

    tokio::select! {
        result = api_handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
