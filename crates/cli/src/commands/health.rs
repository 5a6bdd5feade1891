//! Service health and model information commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_error, print_json, print_success, OutputFormat};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct DescriptionRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn render(rows: Vec<FieldRow>) {
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}

fn list_or_unknown(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Null => "unknown".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Show service health. Exits non-zero when the service is not OK.
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health_check().await;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            if let Some(error) = &health.error {
                print_error(&format!("{} unreachable: {}", client.base_url(), error));
            }
            render(vec![
                FieldRow {
                    field: "Status".into(),
                    value: color_status(&health.status),
                },
                FieldRow {
                    field: "Model loaded".into(),
                    value: health.model_loaded.to_string(),
                },
                FieldRow {
                    field: "Features".into(),
                    value: health.model_features.to_string(),
                },
                FieldRow {
                    field: "Classes".into(),
                    value: list_or_unknown(&health.model_classes),
                },
                FieldRow {
                    field: "Categorical".into(),
                    value: list_or_unknown(&health.categorical_features),
                },
            ]);
            if health.is_ok() {
                print_success("Prediction service is healthy");
            }
        }
    }

    if !health.is_ok() {
        anyhow::bail!("Prediction service status: {}", health.status);
    }
    Ok(())
}

pub async fn show_model_info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.model_info().await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            render(vec![
                FieldRow {
                    field: "Model type".into(),
                    value: info.model_type.clone(),
                },
                FieldRow {
                    field: "Status".into(),
                    value: color_status(&info.status),
                },
                FieldRow {
                    field: "Input features".into(),
                    value: info.input_features.to_string(),
                },
                FieldRow {
                    field: "Target classes".into(),
                    value: info.target_classes.join(", "),
                },
            ]);

            if !info.feature_description.is_empty() {
                let rows: Vec<DescriptionRow> = info
                    .feature_description
                    .iter()
                    .map(|(feature, description)| DescriptionRow {
                        feature: feature.clone(),
                        description: description.clone(),
                    })
                    .collect();
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("\n{}", table);
            }
        }
    }

    Ok(())
}
