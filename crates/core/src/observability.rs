//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, batch size, fallback and error counters)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Histogram buckets for batch sizes
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    batch_size: Histogram,
    predictions_total: IntCounterVec,
    fallback_total: IntCounter,
    prediction_errors: IntCounter,
    coercion_failures: IntCounter,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "dropout_service_prediction_latency_seconds",
                "Time spent encoding records and running the classifier",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            batch_size: register_histogram!(
                "dropout_service_batch_size",
                "Number of records per batch prediction request",
                BATCH_SIZE_BUCKETS.to_vec()
            )
            .expect("Failed to register batch_size"),

            predictions_total: register_int_counter_vec!(
                "dropout_service_predictions_total",
                "Predictions served, by encoding path",
                &["path"]
            )
            .expect("Failed to register predictions_total"),

            fallback_total: register_int_counter!(
                "dropout_service_fallback_total",
                "Backend calls retried with the numeric fallback encoding"
            )
            .expect("Failed to register fallback_total"),

            prediction_errors: register_int_counter!(
                "dropout_service_prediction_errors_total",
                "Prediction calls that failed on both encoding paths"
            )
            .expect("Failed to register prediction_errors"),

            coercion_failures: register_int_counter!(
                "dropout_service_coercion_failures_total",
                "Numeric fields replaced with NaN because they could not be coerced"
            )
            .expect("Failed to register coercion_failures"),

            model_info: register_gauge_vec!(
                "dropout_service_model_info",
                "Information about the loaded classifier",
                &["model_type", "features"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_batch_size(&self, size: usize) {
        self.inner().batch_size.observe(size as f64);
    }

    /// Count served predictions for the given encoding path
    pub fn inc_predictions(&self, path: &str, count: u64) {
        self.inner()
            .predictions_total
            .with_label_values(&[path])
            .inc_by(count);
    }

    pub fn inc_fallback(&self) {
        self.inner().fallback_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_coercion_failures(&self, count: u64) {
        self.inner().coercion_failures.inc_by(count);
    }

    pub fn set_model_info(&self, model_type: &str, features: usize) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[model_type, &features.to_string()])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Emits event-tagged records for startup, model loading and predictions.
/// Caller metadata is only ever logged as present or absent.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_path: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            model_path = %model_path,
            "Student dropout prediction service starting"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction service shutting down"
        );
    }

    pub fn log_model_loaded(&self, model_type: &str, features: usize, classes: &[String]) {
        info!(
            event = "model_loaded",
            service = %self.service,
            model_type = %model_type,
            features = features,
            classes = ?classes,
            "Model loaded successfully"
        );
    }

    pub fn log_model_unavailable(&self, reason: &str) {
        error!(
            event = "model_load_failed",
            service = %self.service,
            reason = %reason,
            "Model not loaded, prediction endpoints will report unavailable"
        );
    }

    pub fn log_prediction(
        &self,
        label: &str,
        confidence: f64,
        risk_level: &str,
        path: &str,
        has_user_data: bool,
    ) {
        info!(
            event = "prediction_served",
            service = %self.service,
            prediction = %label,
            confidence = confidence,
            risk_level = %risk_level,
            path = %path,
            user_data = has_user_data,
            "Prediction made"
        );
    }

    pub fn log_batch(&self, size: usize, path: &str, elapsed_ms: u128) {
        info!(
            event = "batch_served",
            service = %self.service,
            size = size,
            path = %path,
            elapsed_ms = elapsed_ms,
            "Batch prediction completed"
        );
    }

    pub fn log_fallback(&self, rows: usize, cause: &str) {
        warn!(
            event = "fallback_engaged",
            service = %self.service,
            rows = rows,
            cause = %cause,
            "Structured prediction rejected, retrying with numeric encoding"
        );
    }

    pub fn log_prediction_failed(&self, rows: usize, cause: &str) {
        error!(
            event = "prediction_failed",
            service = %self.service,
            rows = rows,
            cause = %cause,
            "Prediction failed on both encoding paths"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_creation() {
        // Global registry: repeated construction must reuse the same metrics
        let metrics = ServiceMetrics::new();
        let again = ServiceMetrics::new();

        metrics.observe_prediction_latency(0.002);
        metrics.observe_batch_size(10);
        metrics.inc_predictions("structured", 1);
        again.inc_predictions("fallback", 2);
        again.inc_fallback();
        metrics.inc_prediction_errors();
        metrics.inc_coercion_failures(2);
        metrics.set_model_info("CatBoostClassifier", 20);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("dropout-service");
        assert_eq!(logger.service, "dropout-service");
    }
}
