//! HTTP API Client
//!
//! Functions for the analyze and history endpoints.

use gloo_net::http::Request;
use web_sys::{File, FormData};

use crate::model::AnalysisResult;

/// Default service base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Get the service base URL from local storage or use default
pub fn get_api_base() -> String {
    let url = web_sys::window()
        .and_then(|window| window.local_storage().ok().flatten())
        .and_then(|storage| storage.get_item("leafguard_api_url").ok().flatten())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    // Normalize: remove trailing slash
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Submit one image for analysis
pub async fn analyze(file: &File) -> Result<AnalysisResult, String> {
    let api_base = get_api_base();

    let form = FormData::new().map_err(|e| format!("Form error: {:?}", e))?;
    form.append_with_blob_and_filename(IMAGE_FIELD, file, &file.name())
        .map_err(|e| format!("Form error: {:?}", e))?;

    let response = Request::post(&format!("{}/analyze", api_base))
        .body(form)
        .map_err(|e| format!("Request build error: {}", e))?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;

    if !response.ok() {
        let status = response.status();
        let message = match response.json::<ApiError>().await {
            Ok(error) => match error.details {
                Some(details) => format!("{} ({})", error.error, details),
                None => error.error,
            },
            Err(_) => "Unknown error".to_string(),
        };
        return Err(format!("Server returned {}: {}", status, message));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Parse error: {}", e))
}

/// Fetch all past analyses
pub async fn fetch_history() -> Result<Vec<AnalysisResult>, String> {
    let api_base = get_api_base();

    let response = Request::get(&format!("{}/history", api_base))
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;

    if !response.ok() {
        return Err(format!("Server returned {}", response.status()));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Parse error: {}", e))
}
