//! Prediction orchestration
//!
//! Encodes records, calls the classifier with the structured encoding, and
//! on a backend rejection retries exactly once with the numeric fallback.
//! Batches are one unit: the whole batch takes the same path and succeeds
//! or fails together.

use crate::backend::{BackendError, Classification, ModelInput};
use crate::bundle::ModelBundle;
use crate::encoder::{CoercionIssue, FallbackEncoder, FeatureEncoder};
use crate::models::{FeatureVector, PredictionRecord};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::response::{BatchResponse, PredictionResponse, ResponseAssembler};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Largest accepted batch
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Maximum {max} predictions per batch request, got {actual}")]
    BatchSizeExceeded { max: usize, actual: usize },

    #[error("{cause}")]
    PredictionFailed { cause: String },
}

/// Encoding that served a backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPath {
    Structured,
    Fallback,
}

impl EncodingPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingPath::Structured => "structured",
            EncodingPath::Fallback => "fallback",
        }
    }
}

struct Served {
    classification: Classification,
    path: EncodingPath,
}

/// Drives single and batch predictions against one model bundle
pub struct PredictionOrchestrator {
    bundle: Arc<ModelBundle>,
    encoder: FeatureEncoder,
    fallback: FallbackEncoder,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl PredictionOrchestrator {
    pub fn new(bundle: Arc<ModelBundle>, metrics: ServiceMetrics, logger: StructuredLogger) -> Self {
        Self {
            bundle,
            encoder: FeatureEncoder::new(),
            fallback: FallbackEncoder::new(),
            metrics,
            logger,
        }
    }

    pub fn bundle(&self) -> &Arc<ModelBundle> {
        &self.bundle
    }

    /// Predict one record
    pub fn predict_one(&self, record: &PredictionRecord) -> Result<PredictionResponse, PredictionError> {
        let start = Instant::now();
        let served = self.serve(std::slice::from_ref(record))?;
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_predictions(served.path.as_str(), 1);

        let assembler = ResponseAssembler::new(self.bundle.schema());
        let response = assembler.assemble(
            served.classification.classes[0],
            &served.classification.probabilities[0],
            record.user_data.as_ref(),
        );

        self.logger.log_prediction(
            &response.prediction,
            response.confidence,
            response.risk_level.as_str(),
            served.path.as_str(),
            record.user_data.is_some(),
        );
        Ok(response)
    }

    /// Predict a batch of at most [`MAX_BATCH_SIZE`] records as one unit
    pub fn predict_batch(&self, records: &[PredictionRecord]) -> Result<BatchResponse, PredictionError> {
        if records.len() > MAX_BATCH_SIZE {
            return Err(PredictionError::BatchSizeExceeded {
                max: MAX_BATCH_SIZE,
                actual: records.len(),
            });
        }
        if records.is_empty() {
            return Ok(BatchResponse {
                predictions: Vec::new(),
            });
        }

        let start = Instant::now();
        self.metrics.observe_batch_size(records.len());
        let served = self.serve(records)?;
        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics
            .inc_predictions(served.path.as_str(), records.len() as u64);

        let assembler = ResponseAssembler::new(self.bundle.schema());
        let Classification {
            classes,
            probabilities,
        } = served.classification;
        let predictions = records
            .iter()
            .zip(classes.into_iter().zip(probabilities))
            .enumerate()
            .map(|(index, (record, (class, row)))| {
                assembler.index(
                    assembler.assemble(class, &row, record.user_data.as_ref()),
                    index,
                )
            })
            .collect();

        self.logger
            .log_batch(records.len(), served.path.as_str(), elapsed.as_millis());
        Ok(BatchResponse { predictions })
    }

    fn encode(&self, records: &[PredictionRecord]) -> Vec<FeatureVector> {
        let schema = self.bundle.schema();
        records
            .iter()
            .map(|record| {
                let encoded = self.encoder.encode(record, schema);
                self.report_coercion(&encoded.coercion_issues);
                encoded.vector
            })
            .collect()
    }

    fn report_coercion(&self, issues: &[CoercionIssue]) {
        if issues.is_empty() {
            return;
        }
        for issue in issues {
            debug!(
                field = issue.field,
                position = issue.position,
                reason = %issue.reason,
                "Could not convert feature to float, using NaN"
            );
        }
        self.metrics.inc_coercion_failures(issues.len() as u64);
    }

    fn serve(&self, records: &[PredictionRecord]) -> Result<Served, PredictionError> {
        let schema = self.bundle.schema();
        let classifier = self.bundle.classifier();
        let vectors = self.encode(records);
        let expected_classes = schema.class_labels().len();

        let primary = classifier
            .classify(ModelInput::Structured {
                columns: schema.feature_names(),
                rows: &vectors,
            })
            .and_then(|c| check_shape(c, records.len(), expected_classes));

        let cause = match primary {
            Ok(classification) => {
                return Ok(Served {
                    classification,
                    path: EncodingPath::Structured,
                })
            }
            Err(cause) => cause,
        };

        self.metrics.inc_fallback();
        self.logger.log_fallback(records.len(), &cause.to_string());

        let matrix = self.fallback.encode_batch(&vectors, schema.len());
        classifier
            .classify(ModelInput::Numeric(&matrix))
            .and_then(|c| check_shape(c, records.len(), expected_classes))
            .map(|classification| Served {
                classification,
                path: EncodingPath::Fallback,
            })
            .map_err(|e| {
                let cause = e.to_string();
                self.metrics.inc_prediction_errors();
                self.logger.log_prediction_failed(records.len(), &cause);
                PredictionError::PredictionFailed { cause }
            })
    }
}

/// Reject backend output that does not line up with the request
fn check_shape(
    classification: Classification,
    rows: usize,
    classes: usize,
) -> Result<Classification, BackendError> {
    if classification.classes.len() != rows || classification.probabilities.len() != rows {
        return Err(BackendError::MalformedOutput(format!(
            "expected {rows} rows, got {} classes and {} probability rows",
            classification.classes.len(),
            classification.probabilities.len()
        )));
    }
    if let Some(row) = classification.probabilities.iter().find(|r| r.len() != classes) {
        return Err(BackendError::MalformedOutput(format!(
            "expected {classes} class probabilities, got {}",
            row.len()
        )));
    }
    Ok(classification)
}
