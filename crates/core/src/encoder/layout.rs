//! Named field-to-position layout agreed with the trained model

use crate::models::PredictionRecord;
use crate::schema::{FeatureSchema, SchemaError};

/// Untyped value pulled out of a record slot
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Absent,
}

impl From<Option<i64>> for RawValue {
    fn from(value: Option<i64>) -> Self {
        value.map(RawValue::Int).unwrap_or(RawValue::Absent)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map(RawValue::Float).unwrap_or(RawValue::Absent)
    }
}

impl From<Option<&String>> for RawValue {
    fn from(value: Option<&String>) -> Self {
        value.map(|s| RawValue::Text(s.clone())).unwrap_or(RawValue::Absent)
    }
}

/// One position of the layout
pub struct FieldSlot {
    pub name: &'static str,
    pub extract: fn(&PredictionRecord) -> RawValue,
}

impl std::fmt::Debug for FieldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSlot").field("name", &self.name).finish()
    }
}

macro_rules! flag_slot {
    ($field:ident) => {
        FieldSlot {
            name: stringify!($field),
            extract: |r| RawValue::Int(i64::from(r.$field)),
        }
    };
}

/// Positional layout of a record; index `i` feeds feature `i`
pub static FIELD_LAYOUT: [FieldSlot; 20] = [
    FieldSlot { name: "age", extract: |r| RawValue::Float(r.age) },
    FieldSlot { name: "gender", extract: |r| RawValue::Text(r.gender.clone()) },
    FieldSlot { name: "nationality", extract: |r| RawValue::Int(r.nationality) },
    FieldSlot { name: "highschool_score", extract: |r| RawValue::Float(r.highschool_score) },
    FieldSlot {
        name: "entrance_exam_score_normalized",
        extract: |r| RawValue::Float(r.entrance_exam_score_normalized),
    },
    FieldSlot { name: "department", extract: |r| r.department.into() },
    FieldSlot { name: "admission_type", extract: |r| r.admission_type.into() },
    FieldSlot { name: "family_income_bracket", extract: |r| r.family_income_bracket.into() },
    FieldSlot { name: "parent_education", extract: |r| RawValue::Int(r.parent_education) },
    FieldSlot { name: "scholarship_status", extract: |r| r.scholarship_status.as_ref().into() },
    FieldSlot { name: "residence_type", extract: |r| r.residence_type.as_ref().into() },
    FieldSlot { name: "commute_distance_km", extract: |r| r.commute_distance_km.into() },
    flag_slot!(department_missing),
    flag_slot!(admission_type_missing),
    flag_slot!(backlogs_count_missing),
    flag_slot!(scholarship_status_missing),
    flag_slot!(fee_payment_status_missing),
    flag_slot!(residence_type_missing),
    flag_slot!(family_income_bracket_missing),
    flag_slot!(commute_distance_km_missing),
];

/// Layout field names in positional order
pub fn layout_names() -> Vec<&'static str> {
    FIELD_LAYOUT.iter().map(|slot| slot.name).collect()
}

/// Raw values of a record in positional order
pub fn extract_all(record: &PredictionRecord) -> Vec<RawValue> {
    FIELD_LAYOUT.iter().map(|slot| (slot.extract)(record)).collect()
}

/// Check the layout against a resolved schema.
///
/// Lengths must always agree. Names are compared only when the schema
/// names came from the model rather than being synthesized.
pub fn validate_layout(schema: &FeatureSchema) -> Result<(), SchemaError> {
    if schema.len() != FIELD_LAYOUT.len() {
        return Err(SchemaError::LayoutLength {
            layout: FIELD_LAYOUT.len(),
            schema: schema.len(),
        });
    }

    if schema.names_synthesized() {
        return Ok(());
    }

    for (position, (slot, name)) in FIELD_LAYOUT.iter().zip(schema.feature_names()).enumerate() {
        if slot.name != name.as_str() {
            return Err(SchemaError::LayoutName {
                position,
                expected: slot.name.to_string(),
                actual: name.clone(),
            });
        }
    }

    Ok(())
}
