//! HTTP client for the forecast backend.
//!
//! Every JSON endpoint may answer with `{"error": "..."}` instead of its
//! regular payload, on any status code. [`decode_payload`] turns such
//! bodies into [`DashboardError::Backend`] before the payload is decoded.

use crate::config::ApiConfig;
use crate::error::{DashboardError, Result};
use crate::models::{
    BatchPredictionResponse, DatasetSummary, ExportDocument, ExportRequest, HistoricalRecord,
    HistoryFilter, PredictionRequestParams, SinglePredictionResponse,
};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Operations offered by the forecast backend.
///
/// The orchestrator and the summary loader only see this trait, so tests
/// can swap in an in-memory backend.
#[allow(async_fn_in_trait)]
pub trait DashboardApi {
    /// `GET /api/data/summary`
    async fn data_summary(&self) -> Result<DatasetSummary>;

    /// `GET /api/historical/data`, normalized to a sequence.
    async fn historical_data(&self, filter: &HistoryFilter) -> Result<Vec<HistoricalRecord>>;

    /// `GET /api/job/types`
    async fn job_types(&self) -> Result<Vec<String>>;

    /// `GET /api/system/status`. Shape is backend-defined.
    async fn system_status(&self) -> Result<Value>;

    /// `POST /api/predict`
    async fn predict(&self, params: &PredictionRequestParams) -> Result<SinglePredictionResponse>;

    /// `POST /api/predict/batch`
    async fn predict_batch(
        &self,
        params: &PredictionRequestParams,
    ) -> Result<BatchPredictionResponse>;

    /// `POST /api/export/results`, returning the binary document.
    async fn export_results(&self, request: &ExportRequest) -> Result<ExportDocument>;
}

/// `reqwest` implementation of [`DashboardApi`].
pub struct ApiClient {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the configured backend.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        info!("Using forecast API at {}", config.base_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DashboardError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, e: reqwest::Error) -> DashboardError {
        if e.is_timeout() {
            DashboardError::Transport(format!(
                "Request timed out after {}s",
                self.timeout_seconds
            ))
        } else if e.is_connect() {
            DashboardError::Transport(format!(
                "Cannot connect to the forecast API at {}",
                self.base_url
            ))
        } else {
            DashboardError::Transport(e.to_string())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        decode_payload(status, &body)
    }

    async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        decode_payload(status, &body)
    }
}

impl DashboardApi for ApiClient {
    async fn data_summary(&self) -> Result<DatasetSummary> {
        self.get_json("/api/data/summary", &[]).await
    }

    async fn historical_data(&self, filter: &HistoryFilter) -> Result<Vec<HistoricalRecord>> {
        let query = history_query(filter);
        let payload: OneOrMany = self.get_json("/api/historical/data", &query).await?;
        Ok(payload.into_vec())
    }

    async fn job_types(&self) -> Result<Vec<String>> {
        self.get_json("/api/job/types", &[]).await
    }

    async fn system_status(&self) -> Result<Value> {
        self.get_json("/api/system/status", &[]).await
    }

    async fn predict(&self, params: &PredictionRequestParams) -> Result<SinglePredictionResponse> {
        self.post_json("/api/predict", params).await
    }

    async fn predict_batch(
        &self,
        params: &PredictionRequestParams,
    ) -> Result<BatchPredictionResponse> {
        self.post_json("/api/predict/batch", params).await
    }

    async fn export_results(&self, request: &ExportRequest) -> Result<ExportDocument> {
        let url = self.url("/api/export/results");
        debug!("POST {} ({} results)", url, request.results.len());

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        Ok(ExportDocument {
            filename,
            bytes: body.to_vec(),
        })
    }
}

/// Historical endpoint answers with a list, or a bare object for one row.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<HistoricalRecord>),
    One(HistoricalRecord),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<HistoricalRecord> {
        match self {
            OneOrMany::Many(records) => records,
            OneOrMany::One(record) => vec![record],
        }
    }
}

/// Query string of the historical endpoint. Absent filters are omitted.
fn history_query(filter: &HistoryFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(ref job_type) = filter.job_type {
        query.push(("job_type", job_type.clone()));
    }
    if let Some(year) = filter.year {
        query.push(("tahun", year.to_string()));
    }
    query
}

/// Decode a JSON response body, honouring the backend's `error` field.
pub fn decode_payload<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) if status.is_success() => return Err(DashboardError::Decode(e.to_string())),
        Err(_) => return Err(error_from_body(status, body)),
    };

    if let Some(message) = backend_error(&value) {
        return Err(DashboardError::Backend(message));
    }

    if !status.is_success() {
        return Err(error_from_body(status, body));
    }

    Ok(serde_json::from_value(value)?)
}

/// Error for a non-2xx response, preferring the backend's own message.
fn error_from_body(status: StatusCode, body: &[u8]) -> DashboardError {
    if let Some(message) = serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(backend_error)
    {
        return DashboardError::Backend(message);
    }

    DashboardError::Http {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn backend_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Extract the file name from a `Content-Disposition` header value.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
