//! Prediction result assembly
//!
//! Turns raw backend rows into the wire-level result bundle: probabilities
//! keyed by label for every class, confidence, risk tier, and an echo of
//! caller metadata.

use crate::models::UserData;
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label treated as the positive, at-risk class
pub const DROPOUT_LABEL: &str = "dropout";

/// Label reported when the backend returns an index with no class label
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Confidence above which a dropout prediction is high risk
pub const HIGH_RISK_CONFIDENCE: f64 = 0.7;

/// Coarse risk tier derived from predicted class and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "Low Risk")]
    Low,
}

impl RiskLevel {
    /// High only for a dropout prediction strictly above the threshold
    pub fn assess(label: &str, confidence: f64) -> Self {
        if label != DROPOUT_LABEL {
            RiskLevel::Low
        } else if confidence > HIGH_RISK_CONFIDENCE {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "High Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::Low => "Low Risk",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prediction as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub probabilities: BTreeMap<String, f64>,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

/// Batch entry tagged with the position of its input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(flatten)]
    pub result: PredictionResponse,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub predictions: Vec<BatchItem>,
}

/// Builds responses against one schema
pub struct ResponseAssembler<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> ResponseAssembler<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    /// Assemble one result from a class index and its probability row
    pub fn assemble(
        &self,
        class_index: usize,
        probabilities: &[f64],
        user_data: Option<&UserData>,
    ) -> PredictionResponse {
        let label = self.schema.label_for(class_index).unwrap_or(UNKNOWN_LABEL).to_string();
        let confidence = probabilities.iter().copied().fold(f64::NAN, f64::max);
        let confidence = if confidence.is_nan() { 0.0 } else { confidence };

        let probabilities = self
            .schema
            .class_labels()
            .iter()
            .zip(probabilities)
            .map(|(label, p)| (label.clone(), *p))
            .collect();

        PredictionResponse {
            risk_level: RiskLevel::assess(&label, confidence),
            prediction: label,
            probabilities,
            confidence,
            user_data: user_data.filter(|u| !u.is_empty()).cloned(),
        }
    }

    /// Tag a result with its input position
    pub fn index(&self, result: PredictionResponse, index: usize) -> BatchItem {
        BatchItem { result, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            vec!["a".into()],
            [],
            vec!["not_dropout".into(), "dropout".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::assess("dropout", 0.71), RiskLevel::High);
        assert_eq!(RiskLevel::assess("dropout", 0.7), RiskLevel::Medium);
        assert_eq!(RiskLevel::assess("dropout", 0.55), RiskLevel::Medium);
        assert_eq!(RiskLevel::assess("not_dropout", 0.99), RiskLevel::Low);
        assert_eq!(RiskLevel::assess("Unknown", 0.99), RiskLevel::Low);
    }

    #[test]
    fn test_worked_example() {
        let schema = schema();
        let response = ResponseAssembler::new(&schema).assemble(1, &[0.2, 0.8], None);

        assert_eq!(response.prediction, "dropout");
        assert_eq!(response.confidence, 0.8);
        assert_eq!(response.risk_level, RiskLevel::High);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["risk_level"], "High Risk");
        assert!(json.get("userData").is_none());
    }

    #[test]
    fn test_probabilities_cover_every_class_unmodified() {
        let schema = schema();
        let response = ResponseAssembler::new(&schema).assemble(0, &[0.65, 0.35], None);

        assert_eq!(response.probabilities.len(), 2);
        assert_eq!(response.probabilities["not_dropout"], 0.65);
        assert_eq!(response.probabilities["dropout"], 0.35);
        let total: f64 = response.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(response.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_unknown_class_index() {
        let schema = schema();
        let response = ResponseAssembler::new(&schema).assemble(7, &[0.5, 0.5], None);
        assert_eq!(response.prediction, UNKNOWN_LABEL);
        assert_eq!(response.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_user_data_echo_only_set_fields() {
        let schema = schema();
        let user = UserData {
            name: Some(Some("Ada".into())),
            email: None,
            student_id: Some(Some("S-1".into())),
        };
        let response = ResponseAssembler::new(&schema).assemble(1, &[0.4, 0.6], Some(&user));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userData"], serde_json::json!({ "name": "Ada", "studentId": "S-1" }));

        let nulled = UserData {
            student_id: Some(None),
            ..Default::default()
        };
        let response = ResponseAssembler::new(&schema).assemble(1, &[0.4, 0.6], Some(&nulled));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userData"], serde_json::json!({ "studentId": null }));

        let empty = UserData::default();
        let response = ResponseAssembler::new(&schema).assemble(1, &[0.4, 0.6], Some(&empty));
        assert!(response.user_data.is_none());
    }

    #[test]
    fn test_batch_item_flattens_index() {
        let schema = schema();
        let assembler = ResponseAssembler::new(&schema);
        let item = assembler.index(assembler.assemble(1, &[0.1, 0.9], None), 3);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["index"], 3);
        assert_eq!(json["prediction"], "dropout");
    }
}
