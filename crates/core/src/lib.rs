//! Core library for student dropout risk prediction
//!
//! This crate provides:
//! - Feature schema resolution from a trained classifier
//! - Record encoding with a numeric-only fallback
//! - Backend abstraction with an ONNX implementation
//! - Prediction orchestration and response assembly
//! - Health checks and observability

pub mod backend;
pub mod bundle;
pub mod encoder;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod response;
pub mod schema;

pub use backend::{BackendError, Classification, Classifier, ModelInput, OnnxClassifier};
pub use bundle::{ModelBundle, ModelState};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use orchestrator::{EncodingPath, PredictionError, PredictionOrchestrator, MAX_BATCH_SIZE};
pub use response::{BatchItem, BatchResponse, PredictionResponse, RiskLevel};
pub use schema::{FeatureSchema, SchemaError};
