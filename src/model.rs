//! Analysis Data Model
//!
//! Results produced by the remote analysis service and the small selectors
//! the detection page keeps around them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Prefix used to turn base64 image text into a displayable image source
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Base64 image text, exactly as it travels inside JSON payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageData(String);

impl ImageData {
    /// Wrap already-encoded base64 text
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode raw image bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Image source usable wherever a URL is expected
    pub fn data_uri(&self) -> String {
        format!("{}{}", DATA_URI_PREFIX, self.0)
    }

    /// Decode back to raw image bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.trim())
    }
}

/// Record identifier attached by the server.
///
/// Pushed events carry a plain string, while the history endpoint returns
/// the extended-JSON form `{"$oid": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Plain(String),
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl RecordId {
    pub fn as_str(&self) -> &str {
        match self {
            RecordId::Plain(id) => id,
            RecordId::ObjectId { oid } => oid,
        }
    }
}

/// Result of one leaf analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub decision: String,
    pub disease_name: String,
    pub reason: String,
    pub treatment: String,
    /// Image echoed back by the server, possibly preprocessed
    #[serde(
        rename = "base64_image",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<ImageData>,
}

/// One entry of the history snapshot
pub type HistoryEntry = AnalysisResult;

/// Analysis pushed over the live channel. The image is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAnalysisResult {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub decision: String,
    pub disease_name: String,
    pub reason: String,
    pub treatment: String,
    #[serde(rename = "base64_image")]
    pub image: ImageData,
}

impl From<LiveAnalysisResult> for AnalysisResult {
    fn from(live: LiveAnalysisResult) -> Self {
        Self {
            id: live.id,
            decision: live.decision,
            disease_name: live.disease_name,
            reason: live.reason,
            treatment: live.treatment,
            image: Some(live.image),
        }
    }
}

/// Which retained state the lower half of the page shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
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

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "realtime" | "real-time" | "live" => Ok(ViewMode::Realtime),
            "history" | "historical" => Ok(ViewMode::History),
            other => Err(format!("unknown view: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_result_without_image() {
        let json = r#"{
            "decision": "Diseased",
            "disease_name": "Early Blight",
            "reason": "Concentric rings on lower leaves",
            "treatment": "Copper fungicide"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.disease_name, "Early Blight");
        assert!(result.image.is_none());
        assert!(result.id.is_none());
    }

    #[test]
    fn test_history_entry_with_object_id() {
        let json = r#"{
            "_id": {"$oid": "65f1c0ffee"},
            "decision": "Not Diseased",
            "disease_name": "None",
            "reason": "Uniform color",
            "treatment": "None required",
            "base64_image": "aGVsbG8="
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id.as_ref().map(RecordId::as_str), Some("65f1c0ffee"));
        assert_eq!(entry.image.unwrap().decode().unwrap(), b"hello");
    }

    #[test]
    fn test_live_result_requires_image() {
        let json = r#"{
            "decision": "reject",
            "disease_name": "Blight",
            "reason": "lesion pattern",
            "treatment": "fungicide X"
        }"#;
        assert!(serde_json::from_str::<LiveAnalysisResult>(json).is_err());
    }

    #[test]
    fn test_data_uri_prefix() {
        let image = ImageData::from_bytes(&[0xff, 0xd8, 0xff]);
        assert_eq!(image.data_uri(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!("history".parse::<ViewMode>().unwrap(), ViewMode::History);
        assert_eq!("Realtime".parse::<ViewMode>().unwrap(), ViewMode::Realtime);
        assert!("grid".parse::<ViewMode>().is_err());
    }
}
