//! Analysis Service API
//!
//! Client side of the REST surface exposed by the analysis service.
//!
//! # Endpoints
//!
//! - `POST /analyze` - multipart upload (field `image`), returns one analysis
//! - `GET /history` - every past analysis, in server order
//!
//! Both are reached through [`AnalysisService`], so the session can be
//! driven by the HTTP client or by an in-memory stand-in.

pub mod client;
pub mod dto;
pub mod error;

pub use client::HttpAnalysisClient;
pub use error::{ApiError, ApiResult};

use async_trait::async_trait;

use crate::model::{AnalysisResult, HistoryEntry};
use crate::upload::UploadSelection;

/// The remote analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Submit one image for synchronous analysis
    async fn analyze(&self, upload: &UploadSelection) -> ApiResult<AnalysisResult>;

    /// Fetch the full list of past analyses
    async fn history(&self) -> ApiResult<Vec<HistoryEntry>>;
}
