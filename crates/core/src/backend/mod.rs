//! Classifier backend abstraction
//!
//! The trained model is opaque to the rest of the crate: it is reached only
//! through [`Classifier`], which exposes `predict`/`predict_proba` plus the
//! schema accessors needed to resolve the feature layout at startup.

mod onnx;

pub use onnx::{LoadError, OnnxClassifier, CATEGORICAL_ATTRIBUTE_KEY, CATEGORICAL_INDICES_KEY};

use crate::models::FeatureVector;
use thiserror::Error;
use tract_onnx::prelude::tract_ndarray::Array2;

/// Input handed to the backend for one joint call
#[derive(Debug, Clone, Copy)]
pub enum ModelInput<'a> {
    /// Named, typed columns; categorical cells carry their category text
    Structured {
        columns: &'a [String],
        rows: &'a [FeatureVector],
    },
    /// Numeric-only matrix, one row per record
    Numeric(&'a Array2<f32>),
}

impl ModelInput<'_> {
    pub fn row_count(&self) -> usize {
        match self {
            ModelInput::Structured { rows, .. } => rows.len(),
            ModelInput::Numeric(matrix) => matrix.nrows(),
        }
    }
}

/// Class indices and probability rows for one joint call
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub classes: Vec<usize>,
    pub probabilities: Vec<Vec<f64>>,
}

/// Rejection raised by the backend for a prediction call
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("input not supported by backend: {0}")]
    UnsupportedInput(String),

    #[error("feature shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

/// Capability exposed by a loaded classifier
pub trait Classifier: Send + Sync {
    /// Short descriptive label for the model family
    fn model_type(&self) -> &str;

    /// Feature names in training order, if the artifact carries them
    fn feature_names(&self) -> Option<Vec<String>>;

    /// Number of input features, if known
    fn feature_count(&self) -> Option<usize>;

    /// Class labels in output order, if the artifact carries them
    fn class_labels(&self) -> Option<Vec<String>>;

    /// Categorical feature indices published through the model's own accessor
    fn cat_feature_indices(&self) -> Option<Vec<usize>> {
        None
    }

    /// Categorical feature indices stored as an internal model attribute
    fn cat_features_attribute(&self) -> Option<Vec<usize>> {
        None
    }

    /// Per-row class probabilities
    fn predict_proba(&self, input: ModelInput<'_>) -> Result<Vec<Vec<f64>>, BackendError>;

    /// Per-row predicted class index
    fn predict(&self, input: ModelInput<'_>) -> Result<Vec<usize>, BackendError> {
        Ok(self.predict_proba(input)?.iter().map(|row| argmax(row)).collect())
    }

    /// Both outputs for one call. Backends that produce classes and
    /// probabilities from a single run should override this.
    fn classify(&self, input: ModelInput<'_>) -> Result<Classification, BackendError> {
        let classes = self.predict(input)?;
        let probabilities = self.predict_proba(input)?;
        Ok(Classification {
            classes,
            probabilities,
        })
    }
}

/// Index of the largest value; ties resolve to the lowest index
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
