//! Record-to-feature encoding
//!
//! The primary encoder keeps categorical positions as category text and
//! everything else as floats, matching the typed frame the classifier was
//! trained on. The fallback encoder in [`fallback`] produces a numeric-only
//! approximation for backends that reject the typed input.

mod fallback;
mod layout;

pub use fallback::{category_bucket, FallbackEncoder, CATEGORY_BUCKETS};
pub use layout::{extract_all, layout_names, validate_layout, FieldSlot, RawValue, FIELD_LAYOUT};

use crate::models::{Cell, FeatureVector, PredictionRecord};
use crate::schema::FeatureSchema;

/// Category text used for an absent categorical value
pub const MISSING_CATEGORY: &str = "nan";

/// Outcome of coercing a raw value to a float
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(f64),
    Missing,
    Invalid(String),
}

/// Coerce a raw slot value to a float
pub fn coerce_numeric(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Int(v) => Coerced::Value(*v as f64),
        RawValue::Float(v) if v.is_nan() => Coerced::Missing,
        RawValue::Float(v) => Coerced::Value(*v),
        RawValue::Text(text) => match text.trim().parse::<f64>() {
            Ok(v) if v.is_nan() => Coerced::Missing,
            Ok(v) => Coerced::Value(v),
            Err(e) => Coerced::Invalid(format!("'{text}' is not numeric: {e}")),
        },
        RawValue::Absent => Coerced::Missing,
    }
}

/// Category text for a raw slot value; `None` when the value is absent
pub fn category_text(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Int(v) => Some(v.to_string()),
        RawValue::Float(v) if v.is_nan() => None,
        RawValue::Float(v) => Some(float_category_text(*v)),
        RawValue::Text(text) => Some(text.clone()),
        RawValue::Absent => None,
    }
}

/// Float spelled the way the training frame stored it: shortest
/// round-trip digits, a trailing `.0` on whole values, and exponent form
/// (`1e-05`, `1.5e+16`) outside `1e-4 <= |v| < 1e16`
fn float_category_text(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }

    let scientific = format!("{v:e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if v == 0.0 || (-4..16).contains(&exponent) {
        let text = v.to_string();
        if text.contains('.') {
            text
        } else {
            format!("{text}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// A numeric slot whose value could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionIssue {
    pub position: usize,
    pub field: &'static str,
    pub reason: String,
}

/// Encoded record plus any recovered coercion failures
#[derive(Debug, Clone)]
pub struct EncodedRecord {
    pub vector: FeatureVector,
    pub coercion_issues: Vec<CoercionIssue>,
}

/// Primary structured encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode one record against the schema.
    ///
    /// The schema must have been validated against [`FIELD_LAYOUT`]; the
    /// output always has one cell per layout slot.
    pub fn encode(&self, record: &PredictionRecord, schema: &FeatureSchema) -> EncodedRecord {
        let mut coercion_issues = Vec::new();

        let cells = FIELD_LAYOUT
            .iter()
            .enumerate()
            .map(|(position, slot)| {
                let raw = (slot.extract)(record);
                if schema.is_categorical(position) {
                    return Cell::Categorical(
                        category_text(&raw).unwrap_or_else(|| MISSING_CATEGORY.to_string()),
                    );
                }
                match coerce_numeric(&raw) {
                    Coerced::Value(v) => Cell::Numeric(v),
                    Coerced::Missing => Cell::Missing,
                    Coerced::Invalid(reason) => {
                        coercion_issues.push(CoercionIssue {
                            position,
                            field: slot.name,
                            reason,
                        });
                        Cell::Missing
                    }
                }
            })
            .collect();

        EncodedRecord {
            vector: FeatureVector::new(cells),
            coercion_issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_record;
    use crate::schema::DEFAULT_CATEGORICAL_INDICES;

    fn schema() -> FeatureSchema {
        let names = layout_names().into_iter().map(String::from).collect();
        FeatureSchema::new(
            names,
            DEFAULT_CATEGORICAL_INDICES,
            vec!["not_dropout".into(), "dropout".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&RawValue::Int(3)), Coerced::Value(3.0));
        assert_eq!(coerce_numeric(&RawValue::Float(f64::NAN)), Coerced::Missing);
        assert_eq!(coerce_numeric(&RawValue::Text(" 4.5 ".into())), Coerced::Value(4.5));
        assert_eq!(coerce_numeric(&RawValue::Absent), Coerced::Missing);
        assert!(matches!(
            coerce_numeric(&RawValue::Text("hostel".into())),
            Coerced::Invalid(_)
        ));
    }

    #[test]
    fn test_category_text() {
        assert_eq!(category_text(&RawValue::Int(1)), Some("1".to_string()));
        assert_eq!(category_text(&RawValue::Float(12.0)), Some("12.0".to_string()));
        assert_eq!(category_text(&RawValue::Float(12.5)), Some("12.5".to_string()));
        assert_eq!(category_text(&RawValue::Float(0.0001)), Some("0.0001".to_string()));
        assert_eq!(category_text(&RawValue::Float(1e-5)), Some("1e-05".to_string()));
        assert_eq!(category_text(&RawValue::Float(1e15)), Some("1000000000000000.0".to_string()));
        assert_eq!(category_text(&RawValue::Float(1e16)), Some("1e+16".to_string()));
        assert_eq!(category_text(&RawValue::Float(-2.5e20)), Some("-2.5e+20".to_string()));
        assert_eq!(category_text(&RawValue::Float(-0.0)), Some("-0.0".to_string()));
        assert_eq!(category_text(&RawValue::Text("M".into())), Some("M".to_string()));
        assert_eq!(category_text(&RawValue::Float(f64::NAN)), None);
        assert_eq!(category_text(&RawValue::Absent), None);
    }

    #[test]
    fn test_length_matches_schema() {
        let schema = schema();
        let encoded = FeatureEncoder::new().encode(&sample_record(), &schema);
        assert_eq!(encoded.vector.len(), schema.len());
    }

    #[test]
    fn test_cell_types_follow_schema() {
        let schema = schema();
        let encoded = FeatureEncoder::new().encode(&sample_record(), &schema);

        for (i, cell) in encoded.vector.iter().enumerate() {
            if schema.is_categorical(i) {
                assert!(cell.is_categorical(), "position {i} should be categorical");
            } else {
                assert!(
                    matches!(cell, Cell::Numeric(_) | Cell::Missing),
                    "position {i} should be numeric"
                );
            }
        }
    }

    #[test]
    fn test_absent_categorical_is_nan_sentinel() {
        let encoded = FeatureEncoder::new().encode(&sample_record(), &schema());
        assert_eq!(encoded.vector.get(5), Some(&Cell::Categorical("nan".into())));
        assert_eq!(encoded.vector.get(1), Some(&Cell::Categorical("M".into())));
        assert_eq!(encoded.vector.get(2), Some(&Cell::Categorical("1".into())));
    }

    #[test]
    fn test_missing_numeric_independent_of_flag() {
        let schema = schema();
        let mut record = sample_record();
        record.family_income_bracket = None;
        record.family_income_bracket_missing = 0;
        let encoded = FeatureEncoder::new().encode(&record, &schema);
        assert_eq!(encoded.vector.get(7), Some(&Cell::Missing));
        assert_eq!(encoded.vector.get(18), Some(&Cell::Numeric(0.0)));

        record.family_income_bracket = Some(3);
        record.family_income_bracket_missing = 1;
        let encoded = FeatureEncoder::new().encode(&record, &schema);
        assert_eq!(encoded.vector.get(7), Some(&Cell::Numeric(3.0)));
        assert_eq!(encoded.vector.get(18), Some(&Cell::Numeric(1.0)));
    }

    #[test]
    fn test_flag_at_categorical_position_is_text() {
        let mut record = sample_record();
        record.department_missing = 1;
        let encoded = FeatureEncoder::new().encode(&record, &schema());
        assert_eq!(encoded.vector.get(12), Some(&Cell::Categorical("1".into())));
    }

    #[test]
    fn test_coercion_failure_recovered() {
        let mut record = sample_record();
        record.scholarship_status = Some("scholarship".to_string());
        record.residence_type = Some("hostel".to_string());

        let encoded = FeatureEncoder::new().encode(&record, &schema());
        assert_eq!(encoded.vector.len(), 20);
        assert_eq!(encoded.vector.get(9), Some(&Cell::Missing));
        assert_eq!(encoded.vector.get(10), Some(&Cell::Missing));
        assert_eq!(encoded.vector.get(0), Some(&Cell::Numeric(20.0)));

        let fields: Vec<_> = encoded.coercion_issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["scholarship_status", "residence_type"]);
    }

    #[test]
    fn test_categorical_commute_distance() {
        let mut record = sample_record();
        record.commute_distance_km = Some(7.0);
        let encoded = FeatureEncoder::new().encode(&record, &schema());
        assert_eq!(encoded.vector.get(11), Some(&Cell::Categorical("7.0".into())));
    }
}
