//! Analysis payloads as they arrive from the service

use serde::Deserialize;

/// Prefix turning base64 image text into an image source
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// One analysis, from `/analyze`, `/history` or a pushed `result` event
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub decision: String,
    pub disease_name: String,
    pub reason: String,
    pub treatment: String,
    #[serde(default)]
    pub base64_image: Option<String>,
}

impl AnalysisResult {
    /// Image source for the echoed image, if any
    pub fn image_src(&self) -> Option<String> {
        self.base64_image
            .as_deref()
            .filter(|data| !data.trim().is_empty())
            .map(|data| format!("{}{}", DATA_URI_PREFIX, data))
    }
}

/// Which panel the lower half shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Realtime,
    History,
}

impl ViewMode {
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Realtime => "Real-time Feed",
            ViewMode::History => "Historical Data",
        }
    }
}

/// Extensions the drop zone accepts
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn is_accepted(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            ACCEPTED_EXTENSIONS.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}
