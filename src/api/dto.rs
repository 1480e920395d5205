//! Wire DTOs
//!
//! Shapes the analysis service sends that are not part of the page model.

use serde::Deserialize;

/// Error body returned on non-success statuses, e.g.
/// `{"error": "Failed to parse response", "details": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        match &self.details {
            Some(serde_json::Value::String(details)) => format!("{} ({})", self.error, details),
            Some(details) => format!("{} ({})", self.error, details),
            None => self.error.clone(),
        }
    }
}

/// Longest raw body quoted in an error message
const MAX_RAW_BODY: usize = 200;

/// Turn a failed response body into a message: the structured error if the
/// server sent one, otherwise a truncated copy of the raw text.
pub fn describe_error_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.summary();
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_RAW_BODY {
        let truncated: String = trimmed.chars().take(MAX_RAW_BODY).collect();
        format!("{}...", truncated)
    } else {
        trimmed.to_string()
    }
}
