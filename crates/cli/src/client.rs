//! API client for the dropout prediction service

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Timeout for a single prediction
pub const PREDICT_TIMEOUT: Duration = Duration::from_secs(10);

/// Batches get twice the single-prediction budget
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(20);

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Prediction service is not running")]
    ServiceNotRunning,

    #[error("No response from prediction service")]
    NoResponse,

    #[error("Prediction service error: {detail}")]
    Service { status: u16, detail: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ClientError::ServiceNotRunning
        } else if err.is_timeout() {
            ClientError::NoResponse
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

/// API client for the prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // A trailing slash keeps `join` from dropping a base path segment
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let response = self.client.get(url).timeout(timeout).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Service {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(response.json().await?)
    }

    /// Service health; an unreachable service is reported as status `ERROR`
    pub async fn health_check(&self) -> HealthStatus {
        match self.get("health", HEALTH_TIMEOUT).await {
            Ok(health) => health,
            Err(e) => HealthStatus::unreachable(e.to_string()),
        }
    }

    pub async fn model_info(&self) -> Result<ModelInfo, ClientError> {
        self.get("model-info", HEALTH_TIMEOUT).await
    }

    /// Predict one student record
    pub async fn predict(&self, record: &Value) -> Result<PredictionResult, ClientError> {
        self.post("predict", record, PREDICT_TIMEOUT).await
    }

    /// Predict a batch of student records, results in input order
    pub async fn batch_predict(&self, records: &[Value]) -> Result<Vec<BatchPrediction>, ClientError> {
        let body = BatchRequest {
            predictions: records,
        };
        let response: BatchResponse = self.post("batch-predict", &body, BATCH_TIMEOUT).await?;
        Ok(response.predictions)
    }
}

/// Pull `detail` (or `error`) out of an error body, else return it as is
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("detail").or_else(|| json.get("error")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

// API request and response types

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    predictions: &'a [Value],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_features: usize,
    #[serde(default)]
    pub model_feature_names: Vec<String>,
    #[serde(default)]
    pub model_classes: Value,
    #[serde(default)]
    pub categorical_features: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn unreachable(error: String) -> Self {
        Self {
            status: "ERROR".to_string(),
            model_loaded: false,
            model_features: 0,
            model_feature_names: Vec::new(),
            model_classes: Value::Null,
            categorical_features: Value::Null,
            service: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub input_features: usize,
    pub target_classes: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub feature_description: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub probabilities: BTreeMap<String, f64>,
    pub confidence: f64,
    pub risk_level: String,
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub predictions: Vec<BatchPrediction>,
}
