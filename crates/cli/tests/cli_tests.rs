//! CLI integration tests

use dropout_cli::client::{ApiClient, ClientError};
use dropout_cli::commands::predict::{load_record, load_records, risk_summary};
use serde_json::json;
use std::process::Command;

fn dropctl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dropctl"))
}

fn record() -> serde_json::Value {
    json!({
        "age": 20,
        "gender": "M",
        "nationality": 1,
        "highschool_score": 85,
        "entrance_exam_score_normalized": 90,
        "parent_education": 2
    })
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = dropctl().arg("--help").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Student Dropout Prediction"), "Should show app name");
    assert!(stdout.contains("health"), "Should show health command");
    assert!(stdout.contains("model-info"), "Should show model-info command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("batch"), "Should show batch command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("DROPCTL_API_URL"), "Should show env var");
}

#[test]
fn test_cli_version() {
    let output = dropctl().arg("--version").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("dropctl"), "Should show binary name");
}

#[test]
fn test_missing_argument() {
    let output = dropctl().arg("predict").output().expect("Failed to execute command");

    assert!(!output.status.success(), "Missing argument should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("required") || stderr.contains("error"));
}

#[test]
fn test_invalid_command() {
    let output = dropctl().arg("invalid-command").output().expect("Failed to execute command");
    assert!(!output.status.success(), "Invalid command should fail");
}

#[tokio::test]
async fn test_predict_against_mock_service() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/predict")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::PartialJson(json!({ "age": 20, "gender": "M" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "prediction": "dropout",
                "probabilities": { "dropout": 0.8, "not_dropout": 0.2 },
                "confidence": 0.8,
                "risk_level": "High Risk",
                "userData": { "name": "Ada" }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let result = client.predict(&record()).await.unwrap();

    assert_eq!(result.prediction, "dropout");
    assert_eq!(result.confidence, 0.8);
    assert_eq!(result.risk_level, "High Risk");
    assert_eq!(result.probabilities["not_dropout"], 0.2);
    assert_eq!(result.user_data.unwrap()["name"], "Ada");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_predict_wraps_records() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/batch-predict")
        .match_body(mockito::Matcher::Json(json!({ "predictions": [record(), record()] })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "predictions": [
                    {
                        "prediction": "not_dropout",
                        "probabilities": { "dropout": 0.1, "not_dropout": 0.9 },
                        "confidence": 0.9,
                        "risk_level": "Low Risk",
                        "index": 0
                    },
                    {
                        "prediction": "dropout",
                        "probabilities": { "dropout": 0.6, "not_dropout": 0.4 },
                        "confidence": 0.6,
                        "risk_level": "Medium Risk",
                        "index": 1
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let predictions = client.batch_predict(&[record(), record()]).await.unwrap();

    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[1].index, 1);
    assert_eq!(predictions[1].result.risk_level, "Medium Risk");

    let summary = risk_summary(&predictions);
    assert_eq!(summary["Low Risk"], 1);
    assert_eq!(summary["Medium Risk"], 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_service_error_surfaces_detail() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/batch-predict")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"Maximum 100 predictions per batch request"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let err = client.batch_predict(&[record()]).await.unwrap_err();

    match &err {
        ClientError::Service { status, detail } => {
            assert_eq!(*status, 400);
            assert_eq!(detail, "Maximum 100 predictions per batch request");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "Prediction service error: Maximum 100 predictions per batch request"
    );
}

#[tokio::test]
async fn test_model_not_loaded() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/predict")
        .with_status(503)
        .with_body(r#"{"detail":"Model not loaded. Please check the service status."}"#)
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let err = client.predict(&record()).await.unwrap_err();
    assert!(matches!(err, ClientError::Service { status: 503, .. }));
}

#[tokio::test]
async fn test_health_check() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "OK",
                "model_loaded": true,
                "model_features": 20,
                "model_feature_names": ["age"],
                "model_classes": ["dropout", "not_dropout"],
                "categorical_features": [1, 2],
                "service": "Student Dropout Prediction API"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let health = client.health_check().await;

    assert!(health.is_ok());
    assert!(health.model_loaded);
    assert_eq!(health.model_features, 20);
    assert!(health.error.is_none());
}

#[tokio::test]
async fn test_health_check_unreachable_service() {
    // Nothing listens on the discard port
    let client = ApiClient::new("http://127.0.0.1:9").unwrap();
    let health = client.health_check().await;

    assert_eq!(health.status, "ERROR");
    assert!(!health.model_loaded);
    assert!(health.error.is_some());
}

#[tokio::test]
async fn test_model_info() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/model-info")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model_type": "CatBoostClassifier",
                "input_features": 20,
                "target_classes": ["dropout", "not_dropout"],
                "status": "loaded",
                "metadata": {},
                "feature_description": { "age": "Student age (15-100)" }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ApiClient::new(&server.url()).unwrap();
    let info = client.model_info().await.unwrap();

    assert_eq!(info.input_features, 20);
    assert_eq!(info.status, "loaded");
    assert_eq!(info.feature_description["age"], "Student age (15-100)");
}

#[test]
fn test_load_records_accepts_both_shapes() {
    let dir = tempfile::tempdir().unwrap();

    let array = dir.path().join("array.json");
    std::fs::write(&array, json!([record(), record()]).to_string()).unwrap();
    assert_eq!(load_records(&array).unwrap().len(), 2);

    let wrapped = dir.path().join("wrapped.json");
    std::fs::write(&wrapped, json!({ "predictions": [record()] }).to_string()).unwrap();
    assert_eq!(load_records(&wrapped).unwrap().len(), 1);

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, json!({ "students": [] }).to_string()).unwrap();
    assert!(load_records(&bad).is_err());
}

#[test]
fn test_load_record() {
    let dir = tempfile::tempdir().unwrap();

    let single = dir.path().join("single.json");
    std::fs::write(&single, record().to_string()).unwrap();
    assert_eq!(load_record(&single).unwrap()["age"], 20);

    let many = dir.path().join("many.json");
    std::fs::write(&many, json!([record(), record()]).to_string()).unwrap();
    assert!(load_record(&many).is_err());

    assert!(load_record(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_batch_command_against_mock_service() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/batch-predict")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "predictions": [{
                    "prediction": "dropout",
                    "probabilities": { "dropout": 0.8, "not_dropout": 0.2 },
                    "confidence": 0.8,
                    "risk_level": "High Risk",
                    "index": 0
                }]
            })
            .to_string(),
        )
        .create();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("students.json");
    std::fs::write(&input, json!([record()]).to_string()).unwrap();

    let output = dropctl()
        .args(["--api-url", &server.url(), "--format", "json", "batch"])
        .arg(&input)
        .env("DROPCTL_CONFIG", dir.path().join("config.json"))
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed[0]["risk_level"], "High Risk");
    assert_eq!(printed[0]["index"], 0);
}
