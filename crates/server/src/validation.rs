//! Request field validation
//!
//! Runs on parsed records before anything reaches the model. Every violated
//! rule is reported, not only the first.

use dropout_core::{PredictionRecord, UserData};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const GENDERS: &[&str] = &["M", "F", "O"];
const SCHOLARSHIP_STATUSES: &[&str] = &["none", "scholarship"];
const RESIDENCE_TYPES: &[&str] = &["day_scholar", "hostel"];

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// One violated rule, located by its path in the request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    fn push(&mut self, prefix: &[String], field: &str, msg: impl Into<String>) {
        let mut loc = prefix.to_vec();
        loc.push(field.to_string());
        self.0.push(FieldError {
            loc,
            msg: msg.into(),
        });
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Validate a single prediction request body
pub fn validate_record(record: &PredictionRecord) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_record(record, &["body".to_string()], &mut errors);
    errors.into_result()
}

/// Validate every record of a batch request body
pub fn validate_batch(records: &[PredictionRecord]) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    for (i, record) in records.iter().enumerate() {
        let prefix = ["body".to_string(), "predictions".to_string(), i.to_string()];
        check_record(record, &prefix, &mut errors);
    }
    errors.into_result()
}

fn check_record(record: &PredictionRecord, prefix: &[String], errors: &mut FieldErrors) {
    check_range(errors, prefix, "age", record.age, 15.0, 100.0);
    check_range(errors, prefix, "highschool_score", record.highschool_score, 0.0, 100.0);
    check_range(
        errors,
        prefix,
        "entrance_exam_score_normalized",
        record.entrance_exam_score_normalized,
        0.0,
        100.0,
    );

    check_choice(errors, prefix, "gender", Some(&record.gender), GENDERS);
    check_choice(
        errors,
        prefix,
        "scholarship_status",
        record.scholarship_status.as_ref(),
        SCHOLARSHIP_STATUSES,
    );
    check_choice(
        errors,
        prefix,
        "residence_type",
        record.residence_type.as_ref(),
        RESIDENCE_TYPES,
    );

    let flags = [
        ("department_missing", record.department_missing),
        ("admission_type_missing", record.admission_type_missing),
        ("backlogs_count_missing", record.backlogs_count_missing),
        ("scholarship_status_missing", record.scholarship_status_missing),
        ("fee_payment_status_missing", record.fee_payment_status_missing),
        ("residence_type_missing", record.residence_type_missing),
        ("family_income_bracket_missing", record.family_income_bracket_missing),
        ("commute_distance_km_missing", record.commute_distance_km_missing),
    ];
    for (field, value) in flags {
        if value > 1 {
            errors.push(prefix, field, "Input should be less than or equal to 1");
        }
    }

    if let Some(user) = &record.user_data {
        check_user_data(user, prefix, errors);
    }
}

fn check_range(
    errors: &mut FieldErrors,
    prefix: &[String],
    field: &str,
    value: f64,
    min: f64,
    max: f64,
) {
    if value.is_nan() || value < min {
        errors.push(prefix, field, format!("Input should be greater than or equal to {min}"));
    } else if value > max {
        errors.push(prefix, field, format!("Input should be less than or equal to {max}"));
    }
}

fn check_choice(
    errors: &mut FieldErrors,
    prefix: &[String],
    field: &str,
    value: Option<&String>,
    allowed: &[&str],
) {
    if let Some(value) = value {
        if !allowed.contains(&value.as_str()) {
            let choices: Vec<_> = allowed.iter().map(|c| format!("\"{c}\"")).collect();
            errors.push(
                prefix,
                field,
                format!("{field} must be one of: {}", choices.join(", ")),
            );
        }
    }
}

fn check_user_data(user: &UserData, prefix: &[String], errors: &mut FieldErrors) {
    if let Some(email) = user.email() {
        if !email_pattern().is_match(email) {
            let mut loc = prefix.to_vec();
            loc.push("userData".to_string());
            errors.push(&loc, "email", "Invalid email format");
        }
    }
}
