use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::MlConfig;

/// Upper bound on the buffered prediction response body.
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Single failure kind for any oracle-call problem: transport, status,
/// timeout or decode. The cause string is all the caller gets.
#[derive(Debug, Clone, Error)]
#[error("ML service error: {0}")]
pub struct OracleError(pub String);

/// Structured result returned by the ML service.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub predicted_price: f64,
    pub model_version: String,
    #[serde(default)]
    pub explanations: Option<HashMap<String, f64>>,
}

#[async_trait]
pub trait PredictionOracle: Send + Sync {
    async fn predict(&self, features: &serde_json::Value) -> Result<PredictResponse, OracleError>;
}

/// HTTP client for the external ML service. One attempt per call, no retry.
pub struct MlHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl MlHttpClient {
    pub fn new(cfg: &MlConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PredictionOracle for MlHttpClient {
    async fn predict(&self, features: &serde_json::Value) -> Result<PredictResponse, OracleError> {
        let payload = serde_json::json!({ "features": features });
        let mut response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(OracleError("response body exceeds 2 MiB limit".into()));
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let decoded: PredictResponse = serde_json::from_slice(&body)
            .map_err(|e| OracleError(format!("invalid response body: {e}")))?;
        debug!(model_version = %decoded.model_version, "oracle prediction received");
        Ok(decoded)
    }
}

fn map_transport_error(error: reqwest::Error) -> OracleError {
    if error.is_timeout() {
        OracleError(format!("request timeout: {error}"))
    } else {
        OracleError(error.to_string())
    }
}

fn map_status_error(status: reqwest::StatusCode, body: &[u8]) -> OracleError {
    let preview = body_preview(body);
    if preview.is_empty() {
        OracleError(format!("status {}", status.as_u16()))
    } else {
        OracleError(format!("status {}: {}", status.as_u16(), preview))
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
