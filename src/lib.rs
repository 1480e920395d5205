//! # LeafGuard
//!
//! Client for a plant-leaf disease detection service: stage one leaf image,
//! submit it for analysis, follow analyses pushed live over Socket.IO and
//! browse the full analysis history.
//!
//! ## Modules
//!
//! - [`api`]: REST client for `POST /analyze` and `GET /history`
//! - [`channel`]: Socket.IO live channel (codec, events, connection task)
//! - [`state`]: detection page state and its transitions
//! - [`session`]: the mounted page, owning state, requests and channel
//! - [`view`]: plain-text page rendering
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leafguard::{session, Config, HttpAnalysisClient};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let client = Arc::new(HttpAnalysisClient::new(&config.server)?);
//!
//!     // Mount the page: opens the live channel and fetches history
//!     let page = session::mount(&config, client)?;
//!
//!     page.stage_file(Path::new("leaf.jpg")).await?;
//!     page.analyze().await?;
//!
//!     let done = page.wait_for(|p| !p.analyzing && (p.result.is_some() || p.error.is_some())).await?;
//!     println!("{}", leafguard::view::render_page(&done));
//!
//!     page.unmount().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod channel;
pub mod config;
pub mod logging;
pub mod model;
pub mod preview;
pub mod session;
pub mod state;
pub mod upload;
pub mod view;

pub use api::{AnalysisService, ApiError, ApiResult, HttpAnalysisClient};
pub use channel::{ChannelEvent, ChannelHandle, ChannelSettings, ChannelStatus};
pub use config::{Config, ConfigError};
pub use model::{AnalysisResult, HistoryEntry, ImageData, LiveAnalysisResult, RecordId, ViewMode};
pub use preview::{Preview, PreviewHandle, PreviewStore};
pub use session::{SessionError, SessionHandle};
pub use state::{DetectionState, Effect, PageSnapshot, RefreshReason};
pub use upload::{UploadError, UploadPolicy, UploadSelection};
