//! Analysis Service REST Client
//!
//! HTTP client for the analyze and history endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::dto::describe_error_body;
use super::error::{ApiError, ApiResult};
use super::AnalysisService;
use crate::config::ServerConfig;
use crate::model::{AnalysisResult, HistoryEntry};
use crate::upload::UploadSelection;

/// Multipart field carrying the image bytes
pub const IMAGE_FIELD: &str = "image";

/// REST client for the analysis service
pub struct HttpAnalysisClient {
    client: Client,
    analyze_url: String,
    history_url: String,
}

impl HttpAnalysisClient {
    /// Create a new client for the configured endpoints
    pub fn new(config: &ServerConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            client,
            analyze_url: config.analyze_url(),
            history_url: config.history_url(),
        })
    }

    pub fn analyze_url(&self) -> &str {
        &self.analyze_url
    }

    pub fn history_url(&self) -> &str {
        &self.history_url
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, upload: &UploadSelection) -> ApiResult<AnalysisResult> {
        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.file_name().to_string())
            .mime_str(upload.content_type())?;
        let form = Form::new().part(IMAGE_FIELD, part);

        tracing::debug!(
            url = %self.analyze_url,
            file = %upload.file_name(),
            size = upload.len(),
            "Submitting image for analysis"
        );

        let response = self
            .client
            .post(&self.analyze_url)
            .multipart(form)
            .send()
            .await?;

        decode_json(response).await
    }

    async fn history(&self) -> ApiResult<Vec<HistoryEntry>> {
        tracing::debug!(url = %self.history_url, "Fetching history");

        let response = self.client.get(&self.history_url).send().await?;
        decode_json(response).await
    }
}

/// Check the status and decode the JSON body
async fn decode_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: describe_error_body(&text),
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
