//! HTTP API: prediction endpoints, health, readiness and Prometheus metrics

use crate::error::{ServiceError, ServiceResult};
use crate::validation::{validate_batch, validate_record};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dropout_core::{
    encoder::FIELD_LAYOUT,
    schema::DEFAULT_CLASS_LABELS,
    BatchResponse, HealthRegistry, ModelState, PredictionOrchestrator, PredictionRecord,
    PredictionResponse, ServiceMetrics, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

const SERVICE_NAME: &str = "Student Dropout Prediction API";

const FEATURE_DESCRIPTIONS: &[(&str, &str)] = &[
    ("age", "Student age (15-100)"),
    ("gender", "Gender: M, F, or O"),
    ("nationality", "Nationality code"),
    ("highschool_score", "High school score (0-100)"),
    ("entrance_exam_score_normalized", "Entrance exam score normalized (0-100)"),
    ("department", "Department code (optional)"),
    ("admission_type", "Admission type code (optional)"),
    ("family_income_bracket", "Family income bracket (optional)"),
    ("parent_education", "Highest parent education level"),
    ("scholarship_status", "Scholarship status: none or scholarship (optional)"),
    ("residence_type", "Residence type: day_scholar or hostel (optional)"),
    ("commute_distance_km", "Commute distance in km (optional)"),
];

/// Shared application state
pub struct AppState {
    pub model: ModelState,
    pub orchestrator: Option<Arc<PredictionOrchestrator>>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(
        model: ModelState,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        let orchestrator = model.bundle().map(|bundle| {
            Arc::new(PredictionOrchestrator::new(
                bundle.clone(),
                metrics.clone(),
                logger,
            ))
        });
        Self {
            model,
            orchestrator,
            health_registry,
            metrics,
        }
    }

    /// Orchestrator for a prediction call, or the error the call must report
    fn orchestrator(
        &self,
        operation: &'static str,
        unavailable: &'static str,
    ) -> ServiceResult<Arc<PredictionOrchestrator>> {
        match (&self.orchestrator, &self.model) {
            (Some(orchestrator), _) => Ok(orchestrator.clone()),
            (None, ModelState::SchemaUnavailable { error, .. }) => {
                Err(ServiceError::PredictionFailed {
                    operation,
                    cause: error.to_string(),
                })
            }
            (None, _) => Err(ServiceError::ModelUnavailable(unavailable)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub predictions: Vec<PredictionRecord>,
}

/// Either a known value or the literal string "unknown"
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OrUnknown<T> {
    Known(T),
    Unknown(&'static str),
}

impl<T> From<Option<T>> for OrUnknown<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(OrUnknown::Unknown("unknown"), OrUnknown::Known)
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    model_loaded: bool,
    model_features: usize,
    model_feature_names: Vec<String>,
    model_classes: OrUnknown<Vec<String>>,
    categorical_features: OrUnknown<Vec<usize>>,
    service: &'static str,
}

#[derive(Debug, Default, Serialize)]
struct ModelMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categorical_features: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categorical_source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModelInfoBody {
    model_type: String,
    input_features: usize,
    target_classes: Vec<String>,
    status: &'static str,
    metadata: ModelMetadata,
    feature_description: BTreeMap<&'static str, &'static str>,
}

/// Service health and model schema summary; always 200
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let schema = state.model.bundle().map(|b| b.schema());
    let feature_names = schema
        .map(|s| s.feature_names().to_vec())
        .unwrap_or_default();

    Json(HealthBody {
        status: if state.model.is_loaded() { "OK" } else { "ERROR" },
        model_loaded: state.model.is_loaded(),
        model_features: feature_names.len(),
        model_feature_names: feature_names,
        model_classes: state.model.class_labels().into(),
        categorical_features: schema
            .map(|s| s.categorical_indices().iter().copied().collect())
            .into(),
        service: SERVICE_NAME,
    })
}

async fn model_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut metadata = ModelMetadata {
        classes: state.model.class_labels(),
        ..Default::default()
    };
    match &state.model {
        ModelState::Ready(bundle) => {
            let schema = bundle.schema();
            metadata.n_features = Some(schema.len());
            metadata.feature_names = Some(schema.feature_names().to_vec());
            metadata.categorical_features =
                Some(schema.categorical_indices().iter().copied().collect());
            metadata.categorical_source = Some(schema.categorical_source());
        }
        ModelState::SchemaUnavailable { error, .. } => {
            metadata.schema_error = Some(error.to_string());
        }
        ModelState::Unavailable { .. } => {}
    }

    Json(ModelInfoBody {
        model_type: state.model.model_type().unwrap_or("unknown").to_string(),
        input_features: FIELD_LAYOUT.len(),
        target_classes: state.model.class_labels().unwrap_or_else(|| {
            DEFAULT_CLASS_LABELS.iter().map(|l| l.to_string()).collect()
        }),
        status: if state.model.is_loaded() { "loaded" } else { "not_loaded" },
        metadata,
        feature_description: FEATURE_DESCRIPTIONS.iter().copied().collect(),
    })
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRecord>, JsonRejection>,
) -> ServiceResult<Json<PredictionResponse>> {
    const OPERATION: &str = "Prediction";

    let Json(record) = payload.map_err(|e| ServiceError::InvalidBody(e.body_text()))?;
    validate_record(&record).map_err(ServiceError::Validation)?;
    let orchestrator =
        state.orchestrator(OPERATION, "Model not loaded. Please check the service status.")?;

    let response = tokio::task::spawn_blocking(move || orchestrator.predict_one(&record))
        .await
        .map_err(|e| ServiceError::PredictionFailed {
            operation: OPERATION,
            cause: e.to_string(),
        })?
        .map_err(|e| ServiceError::from_prediction(OPERATION, e))?;

    Ok(Json(response))
}

async fn batch_predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ServiceResult<Json<BatchResponse>> {
    const OPERATION: &str = "Batch prediction";

    let Json(batch) = payload.map_err(|e| ServiceError::InvalidBody(e.body_text()))?;
    validate_batch(&batch.predictions).map_err(ServiceError::Validation)?;
    let orchestrator = state.orchestrator(OPERATION, "Model not loaded")?;

    let response =
        tokio::task::spawn_blocking(move || orchestrator.predict_batch(&batch.predictions))
            .await
            .map_err(|e| ServiceError::PredictionFailed {
                operation: OPERATION,
                cause: e.to_string(),
            })?
            .map_err(|e| ServiceError::from_prediction(OPERATION, e))?;

    Ok(Json(response))
}

/// Readiness check - 200 if ready, 503 if not
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        ),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/model-info", get(model_info))
        .route("/predict", post(predict))
        .route("/batch-predict", post(batch_predict))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind the listener and serve until the task is dropped
pub async fn serve(addr: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
