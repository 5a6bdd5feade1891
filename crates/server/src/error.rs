//! HTTP error mapping

use crate::validation::FieldErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dropout_core::PredictionError;
use serde_json::json;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// No model artifact was loaded at startup
    ModelUnavailable(&'static str),

    /// Request body could not be parsed into records
    InvalidBody(String),

    /// Parsed records failed field validation
    Validation(FieldErrors),

    BatchTooLarge { max: usize },

    /// Both encoding paths failed, or the model is unusable
    PredictionFailed { operation: &'static str, cause: String },
}

impl ServiceError {
    /// Map an orchestrator error for the named operation
    pub fn from_prediction(operation: &'static str, err: PredictionError) -> Self {
        match err {
            PredictionError::BatchSizeExceeded { max, .. } => ServiceError::BatchTooLarge { max },
            PredictionError::PredictionFailed { cause } => {
                ServiceError::PredictionFailed { operation, cause }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidBody(_) | ServiceError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PredictionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ServiceError::ModelUnavailable(msg) => json!(msg),
            ServiceError::InvalidBody(msg) => json!(msg),
            ServiceError::Validation(errors) => json!(errors),
            ServiceError::BatchTooLarge { max } => {
                json!(format!("Maximum {max} predictions per batch request"))
            }
            ServiceError::PredictionFailed { operation, cause } => {
                tracing::error!(operation, cause = %cause, "Request failed");
                json!(format!("{operation} failed: {cause}"))
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
