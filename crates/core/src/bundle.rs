//! Model + schema bundle built once at startup

use crate::backend::{Classifier, LoadError, OnnxClassifier};
use crate::encoder::validate_layout;
use crate::schema::{default_resolvers, CategoricalResolver, FeatureSchema, SchemaError};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Loaded classifier together with its resolved, layout-checked schema.
///
/// Read-only after construction and shared by every request.
pub struct ModelBundle {
    classifier: Box<dyn Classifier>,
    schema: FeatureSchema,
}

impl ModelBundle {
    /// Resolve the schema with the default resolver chain
    pub fn new(classifier: Box<dyn Classifier>) -> Result<Self, SchemaError> {
        Self::with_resolvers(classifier, &default_resolvers())
    }

    pub fn with_resolvers(
        classifier: Box<dyn Classifier>,
        resolvers: &[Box<dyn CategoricalResolver>],
    ) -> Result<Self, SchemaError> {
        let schema = FeatureSchema::resolve(classifier.as_ref(), resolvers)?;
        validate_layout(&schema)?;
        Ok(Self { classifier, schema })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn model_type(&self) -> &str {
        self.classifier.model_type()
    }
}

/// Startup outcome of loading the model artifact
pub enum ModelState {
    /// Model and schema are usable
    Ready(Arc<ModelBundle>),
    /// Model loaded but its schema could not be resolved
    SchemaUnavailable {
        model_type: String,
        class_labels: Option<Vec<String>>,
        error: SchemaError,
    },
    /// Artifact missing or unreadable
    Unavailable { reason: String },
}

impl ModelState {
    /// Load the artifact and resolve its schema
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Self {
        match OnnxClassifier::from_path(path, expected_sha256) {
            Ok(classifier) => {
                info!(checksum = %classifier.checksum(), "Model artifact verified");
                Self::from_classifier(Box::new(classifier))
            }
            Err(e) => Self::from_load_error(e),
        }
    }

    pub fn from_load_error(err: LoadError) -> Self {
        error!(error = %err, "Error loading model");
        Self::Unavailable {
            reason: err.to_string(),
        }
    }

    pub fn from_classifier(classifier: Box<dyn Classifier>) -> Self {
        let model_type = classifier.model_type().to_string();
        let class_labels = classifier.class_labels();
        match ModelBundle::new(classifier) {
            Ok(bundle) => Self::Ready(Arc::new(bundle)),
            Err(error) => {
                error!(error = %error, model_type = %model_type, "Feature schema unavailable");
                Self::SchemaUnavailable {
                    model_type,
                    class_labels,
                    error,
                }
            }
        }
    }

    /// True when a classifier was loaded, whether or not its schema resolved
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    pub fn bundle(&self) -> Option<&Arc<ModelBundle>> {
        match self {
            Self::Ready(bundle) => Some(bundle),
            _ => None,
        }
    }

    pub fn model_type(&self) -> Option<&str> {
        match self {
            Self::Ready(bundle) => Some(bundle.model_type()),
            Self::SchemaUnavailable { model_type, .. } => Some(model_type),
            Self::Unavailable { .. } => None,
        }
    }

    /// Class labels known for the loaded model, if any
    pub fn class_labels(&self) -> Option<Vec<String>> {
        match self {
            Self::Ready(bundle) => Some(bundle.schema().class_labels().to_vec()),
            Self::SchemaUnavailable { class_labels, .. } => class_labels.clone(),
            Self::Unavailable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ModelInput};
    use crate::encoder::layout_names;

    struct Named(Vec<String>);

    impl Classifier for Named {
        fn model_type(&self) -> &str {
            "named"
        }
        fn feature_names(&self) -> Option<Vec<String>> {
            Some(self.0.clone())
        }
        fn feature_count(&self) -> Option<usize> {
            Some(self.0.len())
        }
        fn class_labels(&self) -> Option<Vec<String>> {
            Some(vec!["not_dropout".into(), "dropout".into()])
        }
        fn predict_proba(&self, _input: ModelInput<'_>) -> Result<Vec<Vec<f64>>, BackendError> {
            Ok(vec![])
        }
    }

    fn layout_strings() -> Vec<String> {
        layout_names().into_iter().map(String::from).collect()
    }

    #[test]
    fn test_ready_with_matching_layout() {
        let state = ModelState::from_classifier(Box::new(Named(layout_strings())));
        assert!(state.is_loaded());
        let bundle = state.bundle().expect("bundle");
        assert_eq!(bundle.schema().len(), 20);
        assert_eq!(bundle.model_type(), "named");
    }

    #[test]
    fn test_length_mismatch_fails_fast() {
        let mut names = layout_strings();
        names.pop();
        let state = ModelState::from_classifier(Box::new(Named(names)));
        assert!(state.is_loaded());
        assert!(state.bundle().is_none());
        match state {
            ModelState::SchemaUnavailable { error, .. } => {
                assert_eq!(error, SchemaError::LayoutLength { layout: 20, schema: 19 });
            }
            _ => panic!("expected schema failure"),
        }
    }

    #[test]
    fn test_name_mismatch_fails_fast() {
        let mut names = layout_strings();
        names.swap(1, 2);
        let state = ModelState::from_classifier(Box::new(Named(names)));
        match state {
            ModelState::SchemaUnavailable { error, class_labels, .. } => {
                assert!(matches!(error, SchemaError::LayoutName { position: 1, .. }));
                assert_eq!(class_labels.unwrap().len(), 2);
            }
            _ => panic!("expected schema failure"),
        }
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = ModelState::load(&dir.path().join("model.onnx"), None);
        assert!(!state.is_loaded());
        assert!(state.model_type().is_none());
        assert!(state.class_labels().is_none());
    }
}
