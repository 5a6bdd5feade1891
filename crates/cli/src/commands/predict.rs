//! Prediction commands

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, BatchPrediction, PredictionResult};
use crate::output::{
    color_confidence, color_risk, format_probability, print_info, print_json, print_warning,
    OutputFormat,
};

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Student")]
    student: String,
    #[tabled(rename = "Prediction")]
    prediction: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Risk")]
    risk: String,
}

#[derive(Tabled)]
struct ProbabilityRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Probability")]
    probability: String,
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Load one student record: a JSON object, or an array holding exactly one
pub fn load_record(path: &Path) -> Result<Value> {
    match read_json(path)? {
        Value::Object(map) => Ok(Value::Object(map)),
        Value::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
        _ => anyhow::bail!("{} must contain a single student record object", path.display()),
    }
}

/// Load batch records: a JSON array, or an object with a `predictions` array
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    match read_json(path)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("predictions") {
            Some(Value::Array(items)) => Ok(items),
            _ => anyhow::bail!("{} has no \"predictions\" array", path.display()),
        },
        _ => anyhow::bail!("{} must contain an array of student records", path.display()),
    }
}

/// Short caller label from echoed user data
fn student_label(result: &PredictionResult) -> String {
    let user = match &result.user_data {
        Some(user) => user,
        None => return "-".to_string(),
    };
    let name = user.get("name").and_then(Value::as_str);
    let id = user.get("studentId").and_then(Value::as_str);
    match (name, id) {
        (Some(name), Some(id)) => format!("{name} ({id})"),
        (Some(name), None) => name.to_string(),
        (None, Some(id)) => id.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn row(index: usize, result: &PredictionResult) -> PredictionRow {
    PredictionRow {
        index,
        student: student_label(result),
        prediction: result.prediction.clone(),
        confidence: color_confidence(result.confidence),
        risk: color_risk(&result.risk_level),
    }
}

/// Predict a single record read from a file
pub async fn predict(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let record = load_record(path)?;
    let result = client.predict(&record).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let table = tabled::Table::new(vec![row(0, &result)])
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let probabilities: Vec<ProbabilityRow> = result
                .probabilities
                .iter()
                .map(|(class, p)| ProbabilityRow {
                    class: class.clone(),
                    probability: format_probability(*p),
                })
                .collect();
            let table = tabled::Table::new(probabilities)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Count results per risk tier
pub fn risk_summary(predictions: &[BatchPrediction]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for p in predictions {
        *summary.entry(p.result.risk_level.clone()).or_insert(0) += 1;
    }
    summary
}

/// Predict a batch of records read from a file
pub async fn batch(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let records = load_records(path)?;
    if records.is_empty() {
        print_warning("No student records in file");
        return Ok(());
    }

    let predictions = client.batch_predict(&records).await?;

    match format {
        OutputFormat::Json => print_json(&predictions)?,
        OutputFormat::Table => {
            let rows: Vec<PredictionRow> =
                predictions.iter().map(|p| row(p.index, &p.result)).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let summary = risk_summary(&predictions)
                .into_iter()
                .map(|(risk, count)| format!("{}: {}", color_risk(&risk), count))
                .collect::<Vec<_>>()
                .join(", ");
            print_info(&format!("{} predictions ({})", predictions.len(), summary));
        }
    }

    Ok(())
}
