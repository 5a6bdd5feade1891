//! Core data models for the dropout prediction service

use serde::{Deserialize, Deserializer, Serialize};

/// One student record as accepted by the prediction endpoints.
///
/// Field names are part of the wire contract with existing clients and
/// must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub age: f64,
    pub gender: String,
    pub nationality: i64,
    pub highschool_score: f64,
    pub entrance_exam_score_normalized: f64,
    #[serde(default)]
    pub department: Option<i64>,
    #[serde(default)]
    pub admission_type: Option<i64>,
    #[serde(default)]
    pub family_income_bracket: Option<i64>,
    pub parent_education: i64,
    #[serde(default)]
    pub scholarship_status: Option<String>,
    #[serde(default)]
    pub residence_type: Option<String>,
    #[serde(default)]
    pub commute_distance_km: Option<f64>,

    #[serde(default)]
    pub department_missing: u8,
    #[serde(default)]
    pub admission_type_missing: u8,
    #[serde(default)]
    pub backlogs_count_missing: u8,
    #[serde(default)]
    pub scholarship_status_missing: u8,
    #[serde(default)]
    pub fee_payment_status_missing: u8,
    #[serde(default)]
    pub residence_type_missing: u8,
    #[serde(default = "flag_set")]
    pub family_income_bracket_missing: u8,
    #[serde(default = "flag_set")]
    pub commute_distance_km_missing: u8,

    /// Caller metadata, echoed back and never fed to the model
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

fn flag_set() -> u8 {
    1
}

/// Opaque caller-supplied metadata.
///
/// Each field is `None` when the caller left it out and `Some(None)` when it
/// was sent as an explicit `null`; both states round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(
        rename = "studentId",
        default,
        deserialize_with = "explicit",
        skip_serializing_if = "Option::is_none"
    )]
    pub student_id: Option<Option<String>>,
}

/// A present key, `null` included, deserializes to `Some`
fn explicit<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl UserData {
    /// True when no field was explicitly set
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.student_id.is_none()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|v| v.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_ref().and_then(|v| v.as_deref())
    }

    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_ref().and_then(|v| v.as_deref())
    }
}

/// One encoded position of a feature vector
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Categorical(String),
    Numeric(f64),
    Missing,
}

impl Cell {
    pub fn is_categorical(&self) -> bool {
        matches!(self, Cell::Categorical(_))
    }

    /// Numeric view of the cell; `Missing` reads as NaN
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Numeric(v) => Some(*v),
            Cell::Missing => Some(f64::NAN),
            Cell::Categorical(_) => None,
        }
    }
}

/// Ordered feature vector matching the resolved schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector(Vec<Cell>);

impl FeatureVector {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.0.iter()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_flag_defaults() {
        let record: PredictionRecord = serde_json::from_value(serde_json::json!({
            "age": 19,
            "gender": "F",
            "nationality": 3,
            "highschool_score": 70.5,
            "entrance_exam_score_normalized": 64,
            "parent_education": 1
        }))
        .unwrap();

        assert_eq!(record.department_missing, 0);
        assert_eq!(record.fee_payment_status_missing, 0);
        assert_eq!(record.family_income_bracket_missing, 1);
        assert_eq!(record.commute_distance_km_missing, 1);
        assert!(record.department.is_none());
        assert!(record.user_data.is_none());
    }

    #[test]
    fn test_user_data_wire_names() {
        let record: PredictionRecord = serde_json::from_value(serde_json::json!({
            "age": 19,
            "gender": "F",
            "nationality": 3,
            "highschool_score": 70.5,
            "entrance_exam_score_normalized": 64,
            "parent_education": 1,
            "userData": { "studentId": "S-100" }
        }))
        .unwrap();

        let user = record.user_data.unwrap();
        assert_eq!(user.student_id(), Some("S-100"));
        assert!(user.name.is_none());

        let echoed = serde_json::to_value(&user).unwrap();
        assert_eq!(echoed, serde_json::json!({ "studentId": "S-100" }));
    }

    #[test]
    fn test_user_data_explicit_null_kept() {
        let user: UserData =
            serde_json::from_value(serde_json::json!({ "name": "Ada", "email": null })).unwrap();

        assert_eq!(user.email, Some(None));
        assert!(user.email().is_none());
        assert!(user.student_id.is_none());
        assert!(!user.is_empty());

        let echoed = serde_json::to_value(&user).unwrap();
        assert_eq!(echoed, serde_json::json!({ "name": "Ada", "email": null }));
    }

    #[test]
    fn test_cell_numeric_view() {
        assert_eq!(Cell::Numeric(2.5).as_f64(), Some(2.5));
        assert!(Cell::Missing.as_f64().unwrap().is_nan());
        assert!(Cell::Categorical("M".into()).as_f64().is_none());
    }
}
