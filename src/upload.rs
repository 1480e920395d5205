//! Upload Selection
//!
//! The single image staged for analysis, and the drop-target filter that
//! decides which files may be staged at all.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::UploadConfig;

/// Single-file drop target with an extension allow-list
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}

impl UploadPolicy {
    /// Check a file name against the allow-list (case-insensitive)
    pub fn accepts(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }

    /// Pick the file to stage from a drop.
    ///
    /// Exactly one file may be dropped; dropping several rejects all of them.
    pub fn pick<'a>(&self, dropped: &'a [PathBuf]) -> Result<&'a PathBuf, UploadError> {
        match dropped {
            [] => Err(UploadError::NoFile),
            [path] if self.accepts(path) => Ok(path),
            [path] => Err(UploadError::UnsupportedExtension {
                path: path.clone(),
            }),
            many => Err(UploadError::TooManyFiles(many.len())),
        }
    }

    /// Human-readable hint listing accepted formats
    pub fn formats_hint(&self) -> String {
        let formats: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect();
        match formats.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                format!("Formats accepted are {} and {}", rest.join(", "), last)
            }
            Some((only, _)) => format!("Formats accepted are {}", only),
            None => "No formats accepted".to_string(),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// A file staged for analysis
#[derive(Debug, Clone)]
pub struct UploadSelection {
    file_name: String,
    content_type: &'static str,
    bytes: Arc<[u8]>,
}

impl UploadSelection {
    /// Build a selection from bytes already in memory
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(Path::new(&file_name));
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, applying the drop-target filter first
    pub async fn load(path: &Path, policy: &UploadPolicy) -> Result<Self, UploadError> {
        if !policy.accepts(path) {
            return Err(UploadError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        tracing::debug!(file = %file_name, size = bytes.len(), "Loaded upload");
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the raw bytes
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match extension_of(path).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Reasons a drop is rejected
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file dropped")]
    NoFile,

    #[error("Only one file may be dropped at a time ({0} given)")]
    TooManyFiles(usize),

    #[error("Unsupported file type: {path:?}")]
    UnsupportedExtension { path: PathBuf },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
