//! Feature schema resolution
//!
//! The schema is derived once from the loaded classifier: ordered feature
//! names, the categorical subset of positions, and the class labels whose
//! order defines the index-to-label mapping for every prediction.

use crate::backend::Classifier;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Categorical positions used when the model publishes none
pub const DEFAULT_CATEGORICAL_INDICES: [usize; 9] = [1, 2, 5, 6, 11, 12, 13, 14, 15];

/// Class labels assumed when the model publishes none
pub const DEFAULT_CLASS_LABELS: [&str; 2] = ["dropout", "not_dropout"];

/// Schema resolution failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("model feature names not available")]
    FeatureNamesUnavailable,

    #[error("duplicate feature name '{0}'")]
    DuplicateFeature(String),

    #[error("duplicate class label '{0}'")]
    DuplicateClassLabel(String),

    #[error("record layout has {layout} fields but the model expects {schema}")]
    LayoutLength { layout: usize, schema: usize },

    #[error("record field '{expected}' at position {position} does not match model feature '{actual}'")]
    LayoutName {
        position: usize,
        expected: String,
        actual: String,
    },
}

/// A strategy for finding the categorical feature positions
pub trait CategoricalResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Indices found by this strategy, or `None` if it has nothing to offer
    fn resolve(&self, model: &dyn Classifier) -> Option<Vec<usize>>;
}

/// Reads the model's public categorical-index accessor
pub struct ModelAccessorResolver;

impl CategoricalResolver for ModelAccessorResolver {
    fn name(&self) -> &'static str {
        "model_accessor"
    }

    fn resolve(&self, model: &dyn Classifier) -> Option<Vec<usize>> {
        model.cat_feature_indices()
    }
}

/// Reads the categorical indices kept as an internal model attribute
pub struct ModelAttributeResolver;

impl CategoricalResolver for ModelAttributeResolver {
    fn name(&self) -> &'static str {
        "model_attribute"
    }

    fn resolve(&self, model: &dyn Classifier) -> Option<Vec<usize>> {
        model.cat_features_attribute()
    }
}

/// Fixed index set
pub struct StaticResolver {
    indices: Vec<usize>,
}

impl StaticResolver {
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }
}

impl CategoricalResolver for StaticResolver {
    fn name(&self) -> &'static str {
        "static_fallback"
    }

    fn resolve(&self, _model: &dyn Classifier) -> Option<Vec<usize>> {
        Some(self.indices.clone())
    }
}

/// Resolver chain in priority order
pub fn default_resolvers() -> Vec<Box<dyn CategoricalResolver>> {
    vec![
        Box::new(ModelAccessorResolver),
        Box::new(ModelAttributeResolver),
        Box::new(StaticResolver::new(DEFAULT_CATEGORICAL_INDICES)),
    ]
}

/// Resolved, immutable feature schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    feature_names: Vec<String>,
    categorical_indices: BTreeSet<usize>,
    class_labels: Vec<String>,
    #[serde(skip)]
    names_synthesized: bool,
    categorical_source: &'static str,
}

impl FeatureSchema {
    /// Build a schema from explicit parts
    pub fn new(
        feature_names: Vec<String>,
        categorical_indices: impl IntoIterator<Item = usize>,
        class_labels: Vec<String>,
    ) -> Result<Self, SchemaError> {
        check_unique(&feature_names)?;
        check_unique_labels(&class_labels)?;
        let len = feature_names.len();
        Ok(Self {
            feature_names,
            categorical_indices: categorical_indices.into_iter().filter(|i| *i < len).collect(),
            class_labels,
            names_synthesized: false,
            categorical_source: "explicit",
        })
    }

    /// Derive the schema from a loaded classifier
    pub fn resolve(
        model: &dyn Classifier,
        resolvers: &[Box<dyn CategoricalResolver>],
    ) -> Result<Self, SchemaError> {
        let (feature_names, names_synthesized) = match model.feature_names() {
            Some(names) if !names.is_empty() => (names, false),
            _ => match model.feature_count() {
                Some(count) => {
                    warn!(count, "Model exposes no feature names, synthesizing generic names");
                    ((0..count).map(|i| format!("feature_{i}")).collect(), true)
                }
                None => return Err(SchemaError::FeatureNamesUnavailable),
            },
        };
        check_unique(&feature_names)?;

        let (categorical_indices, categorical_source) =
            resolve_categorical(model, resolvers, feature_names.len());

        let class_labels = match model.class_labels() {
            Some(labels) if !labels.is_empty() => labels,
            _ => {
                warn!(defaults = ?DEFAULT_CLASS_LABELS, "Model exposes no class labels, using defaults");
                DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect()
            }
        };
        check_unique_labels(&class_labels)?;

        info!(
            features = feature_names.len(),
            categorical = ?categorical_indices,
            categorical_source,
            classes = ?class_labels,
            "Feature schema resolved"
        );

        Ok(Self {
            feature_names,
            categorical_indices,
            class_labels,
            names_synthesized,
            categorical_source,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn categorical_indices(&self) -> &BTreeSet<usize> {
        &self.categorical_indices
    }

    pub fn is_categorical(&self, index: usize) -> bool {
        self.categorical_indices.contains(&index)
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    /// Label for a backend class index
    pub fn label_for(&self, index: usize) -> Option<&str> {
        self.class_labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// True when names were generated as `feature_<i>`
    pub fn names_synthesized(&self) -> bool {
        self.names_synthesized
    }

    /// Name of the resolver that supplied the categorical indices
    pub fn categorical_source(&self) -> &'static str {
        self.categorical_source
    }
}

fn first_duplicate(names: &[String]) -> Option<&String> {
    let mut seen = HashSet::with_capacity(names.len());
    names.iter().find(|name| !seen.insert(name.as_str()))
}

fn check_unique(names: &[String]) -> Result<(), SchemaError> {
    match first_duplicate(names) {
        Some(name) => Err(SchemaError::DuplicateFeature(name.clone())),
        None => Ok(()),
    }
}

/// Probabilities are keyed by label, so labels must be distinct
fn check_unique_labels(labels: &[String]) -> Result<(), SchemaError> {
    match first_duplicate(labels) {
        Some(label) => Err(SchemaError::DuplicateClassLabel(label.clone())),
        None => Ok(()),
    }
}

fn resolve_categorical(
    model: &dyn Classifier,
    resolvers: &[Box<dyn CategoricalResolver>],
    len: usize,
) -> (BTreeSet<usize>, &'static str) {
    for resolver in resolvers {
        let Some(indices) = resolver.resolve(model) else {
            debug!(resolver = resolver.name(), "Categorical resolver had no answer");
            continue;
        };
        if indices.is_empty() {
            debug!(resolver = resolver.name(), "Categorical resolver returned no indices");
            continue;
        }

        let (valid, dropped): (BTreeSet<usize>, Vec<usize>) =
            indices.into_iter().fold((BTreeSet::new(), Vec::new()), |(mut ok, mut bad), i| {
                if i < len {
                    ok.insert(i);
                } else {
                    bad.push(i);
                }
                (ok, bad)
            });
        if !dropped.is_empty() {
            warn!(resolver = resolver.name(), ?dropped, len, "Dropping out-of-range categorical indices");
        }
        if valid.is_empty() {
            debug!(resolver = resolver.name(), "Categorical resolver had no in-range indices");
            continue;
        }
        return (valid, resolver.name());
    }

    warn!("No categorical resolver produced indices, treating every feature as numeric");
    (BTreeSet::new(), "none")
}
