//! ONNX classifier backend using tract
//!
//! The exported model takes a single `f32 [1, n_features]` input and
//! produces class probabilities as a rank-2 `f32` output. Schema
//! information (feature names, class labels, categorical indices) travels
//! in the model's `metadata_props`.

use super::{argmax, BackendError, Classification, Classifier, ModelInput};
use crate::models::Cell;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Metadata key for the public categorical-index accessor
pub const CATEGORICAL_INDICES_KEY: &str = "cat_feature_indices";

/// Metadata key for the categorical indices recorded by the training library
pub const CATEGORICAL_ATTRIBUTE_KEY: &str = "catboost.cat_features";

const FEATURE_NAMES_KEY: &str = "feature_names";
const FEATURE_COUNT_KEY: &str = "n_features";
const CLASS_LABELS_KEY: &str = "class_labels";
const MODEL_TYPE_KEY: &str = "model_type";

/// Per-row latency above which a warning is logged
const SLOW_ROW_MS: u128 = 20;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Failure to turn the artifact into a runnable classifier
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to parse model: {0}")]
    Parse(String),
}

/// Classifier backed by an ONNX graph
pub struct OnnxClassifier {
    plan: TractModel,
    model_type: String,
    feature_names: Option<Vec<String>>,
    feature_count: Option<usize>,
    class_labels: Option<Vec<String>>,
    cat_indices: Option<Vec<usize>>,
    cat_attribute: Option<Vec<usize>>,
    checksum: String,
}

impl OnnxClassifier {
    /// Load the artifact from disk, optionally verifying its SHA-256 digest
    pub fn from_path(path: &Path, expected_sha256: Option<&str>) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), "Loading model artifact");
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let actual = hex::encode(Sha256::digest(&bytes));
        if let Some(expected) = expected_sha256 {
            if !expected.trim().eq_ignore_ascii_case(&actual) {
                return Err(LoadError::ChecksumMismatch {
                    expected: expected.trim().to_lowercase(),
                    actual,
                });
            }
        }

        Self::from_bytes(&bytes)
    }

    /// Parse and optimize an ONNX model from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let onnx = tract_onnx::onnx();
        let proto = onnx
            .proto_model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| LoadError::Parse(format!("{e:#}")))?;

        let metadata: HashMap<String, String> = proto
            .metadata_props
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect();

        let feature_names = metadata.get(FEATURE_NAMES_KEY).and_then(|v| parse_name_list(v));
        let feature_count = feature_names.as_ref().map(Vec::len).or_else(|| {
            metadata
                .get(FEATURE_COUNT_KEY)
                .and_then(|v| v.trim().parse::<usize>().ok())
        });
        let class_labels = metadata.get(CLASS_LABELS_KEY).and_then(|v| parse_name_list(v));
        let cat_indices = metadata
            .get(CATEGORICAL_INDICES_KEY)
            .and_then(|v| parse_index_list(v));
        let cat_attribute = metadata
            .get(CATEGORICAL_ATTRIBUTE_KEY)
            .and_then(|v| parse_index_list(v));

        let model_type = metadata
            .get(MODEL_TYPE_KEY)
            .cloned()
            .or_else(|| Some(proto.producer_name.clone()).filter(|p| !p.is_empty()))
            .unwrap_or_else(|| "onnx".to_string());

        let mut model = onnx
            .model_for_proto_model(&proto)
            .map_err(|e| LoadError::Parse(format!("{e:#}")))?;
        if let Some(n) = feature_count {
            model = model
                .with_input_fact(0, f32::fact([1, n]).into())
                .map_err(|e| LoadError::Parse(format!("failed to set input shape: {e:#}")))?;
        } else {
            warn!("Model metadata carries no feature count, relying on graph input shape");
        }
        let plan = model
            .into_optimized()
            .map_err(|e| LoadError::Parse(format!("failed to optimize model: {e:#}")))?
            .into_runnable()
            .map_err(|e| LoadError::Parse(format!("failed to create runnable model: {e:#}")))?;

        info!(
            model_type = %model_type,
            features = ?feature_count,
            classes = ?class_labels,
            "Model parsed"
        );

        Ok(Self {
            plan,
            model_type,
            feature_names,
            feature_count,
            class_labels,
            cat_indices,
            cat_attribute,
            checksum: hex::encode(Sha256::digest(bytes)),
        })
    }

    /// Hex SHA-256 of the loaded artifact
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn check_width(&self, width: usize) -> Result<(), BackendError> {
        match self.feature_count {
            Some(expected) if expected != width => Err(BackendError::ShapeMismatch {
                expected,
                actual: width,
            }),
            _ => Ok(()),
        }
    }

    /// Flatten the input into numeric rows, rejecting what the graph cannot take
    fn numeric_rows(&self, input: ModelInput<'_>) -> Result<Vec<Vec<f32>>, BackendError> {
        match input {
            ModelInput::Numeric(matrix) => {
                self.check_width(matrix.ncols())?;
                Ok(matrix.rows().into_iter().map(|row| row.to_vec()).collect())
            }
            ModelInput::Structured { columns, rows } => {
                if let Some(names) = &self.feature_names {
                    if names.as_slice() != columns {
                        return Err(BackendError::UnsupportedInput(
                            "column names do not match model features".to_string(),
                        ));
                    }
                }
                self.check_width(columns.len())?;

                rows.iter()
                    .map(|vector| {
                        if vector.len() != columns.len() {
                            return Err(BackendError::ShapeMismatch {
                                expected: columns.len(),
                                actual: vector.len(),
                            });
                        }
                        vector
                            .iter()
                            .zip(columns)
                            .map(|(cell, column)| match cell {
                                Cell::Categorical(_) => Err(BackendError::UnsupportedInput(
                                    format!("categorical column '{column}' cannot be fed to a numeric graph"),
                                )),
                                other => Ok(other.as_f64().unwrap_or(f64::NAN) as f32),
                            })
                            .collect::<Result<Vec<f32>, BackendError>>()
                    })
                    .collect()
            }
        }
    }

    fn run_row(&self, row: Vec<f32>) -> Result<Vec<f64>, BackendError> {
        let start = Instant::now();
        let width = row.len();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, width), row)
            .map_err(|e| BackendError::Inference(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| BackendError::Inference(format!("{e:#}")))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_ROW_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Row inference exceeded {}ms", SLOW_ROW_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Row inference completed");
        }

        for output in outputs.iter() {
            if output.datum_type() == DatumType::F32 && output.rank() == 2 {
                let view = output
                    .to_array_view::<f32>()
                    .map_err(|e| BackendError::MalformedOutput(format!("{e:#}")))?;
                return Ok(view.iter().map(|v| *v as f64).collect());
            }
        }

        Err(BackendError::MalformedOutput(
            "no rank-2 f32 probability output".to_string(),
        ))
    }
}

impl Classifier for OnnxClassifier {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn feature_names(&self) -> Option<Vec<String>> {
        self.feature_names.clone()
    }

    fn feature_count(&self) -> Option<usize> {
        self.feature_count
    }

    fn class_labels(&self) -> Option<Vec<String>> {
        self.class_labels.clone()
    }

    fn cat_feature_indices(&self) -> Option<Vec<usize>> {
        self.cat_indices.clone()
    }

    fn cat_features_attribute(&self) -> Option<Vec<usize>> {
        self.cat_attribute.clone()
    }

    fn predict_proba(&self, input: ModelInput<'_>) -> Result<Vec<Vec<f64>>, BackendError> {
        self.numeric_rows(input)?
            .into_iter()
            .map(|row| self.run_row(row))
            .collect()
    }

    fn classify(&self, input: ModelInput<'_>) -> Result<Classification, BackendError> {
        let probabilities = self.predict_proba(input)?;
        let classes = probabilities.iter().map(|row| argmax(row)).collect();
        Ok(Classification {
            classes,
            probabilities,
        })
    }
}

/// Parse a JSON string array, or a comma-separated list
fn parse_name_list(raw: &str) -> Option<Vec<String>> {
    let names: Vec<String> = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(names) => names,
        Err(_) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };
    Some(names).filter(|n| !n.is_empty())
}

/// Parse a JSON integer array, or a comma-separated list
fn parse_index_list(raw: &str) -> Option<Vec<usize>> {
    if let Ok(indices) = serde_json::from_str::<Vec<usize>>(raw) {
        return Some(indices);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok())
        .collect()
}
