//! Preview Handles
//!
//! A staged file gets a transient, revocable reference (`blob:` style URI)
//! so it can be displayed before submission. Handles revoke themselves on
//! drop, so replacing a preview always releases the previous one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::model::ImageData;
use crate::upload::UploadSelection;

const PREVIEW_SCHEME: &str = "blob:leafguard/";

/// Registry of live preview references
#[derive(Clone, Default)]
pub struct PreviewStore {
    entries: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the staged bytes and hand out a reference to them
    pub fn create(&self, selection: &UploadSelection) -> PreviewHandle {
        let uri = format!("{}{}", PREVIEW_SCHEME, Uuid::new_v4());
        self.lock().insert(uri.clone(), selection.shared_bytes());

        tracing::debug!(uri = %uri, file = %selection.file_name(), "Preview created");
        PreviewHandle {
            uri,
            store: self.clone(),
        }
    }

    /// Look up the bytes behind a live reference
    #[cfg(test)]
    pub fn resolve(&self, uri: &str) -> Option<Arc<[u8]>> {
        self.lock().get(uri).cloned()
    }

    /// Number of references not yet revoked
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, uri: &str) -> bool {
        self.lock().remove(uri).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owned reference to a staged file's preview. Revoked on drop.
pub struct PreviewHandle {
    uri: String,
    store: PreviewStore,
}

impl PreviewHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.uri).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if self.store.revoke(&self.uri) {
            tracing::debug!(uri = %self.uri, "Preview revoked");
        }
    }
}

/// What the upload panel currently displays
#[derive(Debug)]
pub enum Preview {
    /// The locally staged file
    Staged(PreviewHandle),
    /// The image the server echoed after analysis
    Echoed(ImageData),
}

impl Preview {
    /// Displayable image source
    pub fn source(&self) -> String {
        match self {
            Preview::Staged(handle) => handle.uri().to_string(),
            Preview::Echoed(image) => image.data_uri(),
        }
    }

    pub fn is_echoed(&self) -> bool {
        matches!(self, Preview::Echoed(_))
    }
}
