//! Page State
//!
//! Reactive state of the detection page using Leptos signals.

use leptos::*;
use wasm_bindgen::JsValue;
use web_sys::File;

use crate::api;
use crate::model::{is_accepted, AnalysisResult, ViewMode};

/// Message shown when analysis fails, whatever the cause
pub const ANALYZE_FAILED_MESSAGE: &str = "Failed to analyze image. Please try again.";

/// Object URL for a staged file. Revoked on drop, so replacing the preview
/// signal releases the previous one.
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn create(file: &File) -> Option<Self> {
        web_sys::Url::create_object_url_with_blob(file).ok().map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        let _ = web_sys::Url::revoke_object_url(&self.0);
    }
}

/// Image shown in the upload panel
pub enum Preview {
    /// The staged file
    Local(ObjectUrl),
    /// The image echoed back by the analysis
    Echoed(String),
}

impl Preview {
    pub fn src(&self) -> String {
        match self {
            Preview::Local(url) => url.as_str().to_string(),
            Preview::Echoed(src) => src.clone(),
        }
    }
}

/// Page state provided to all components
#[derive(Clone, Copy)]
pub struct PageState {
    /// File staged for analysis
    pub file: RwSignal<Option<File>>,
    pub preview: RwSignal<Option<Preview>>,
    /// Busy flag for the analyze request
    pub analyzing: RwSignal<bool>,
    pub result: RwSignal<Option<AnalysisResult>>,
    pub error: RwSignal<Option<String>>,
    /// Live channel status
    pub connected: RwSignal<bool>,
    /// Most recent pushed analysis
    pub live: RwSignal<Option<AnalysisResult>>,
    pub live_received_at: RwSignal<Option<String>>,
    pub view: RwSignal<ViewMode>,
    pub history: RwSignal<Vec<AnalysisResult>>,
}

/// Provide page state to the component tree
pub fn provide_page_state() -> PageState {
    let state = PageState::new();
    provide_context(state);
    state
}

impl PageState {
    pub(crate) fn new() -> Self {
        Self {
            file: create_rw_signal(None),
            preview: create_rw_signal(None),
            analyzing: create_rw_signal(false),
            result: create_rw_signal(None),
            error: create_rw_signal(None),
            connected: create_rw_signal(false),
            live: create_rw_signal(None),
            live_received_at: create_rw_signal(None),
            view: create_rw_signal(ViewMode::default()),
            history: create_rw_signal(Vec::new()),
        }
    }

    /// Stage a file. Files outside the allow-list are ignored.
    pub fn submit_selection(&self, file: File) {
        if !is_accepted(&file.name()) {
            web_sys::console::log_1(&format!("Ignoring unsupported file: {}", file.name()).into());
            return;
        }

        self.result.set(None);
        self.error.set(None);
        self.preview.set(ObjectUrl::create(&file).map(Preview::Local));
        self.file.set(Some(file));
    }

    pub fn can_analyze(&self) -> bool {
        self.file.with(Option::is_some) && !self.analyzing.get()
    }

    /// Submit the staged file. No-op when nothing is staged or a request is
    /// already in flight.
    pub fn analyze(&self) {
        if self.analyzing.get_untracked() {
            return;
        }
        let Some(file) = self.file.get_untracked() else {
            return;
        };

        self.analyzing.set(true);
        self.error.set(None);

        let state = *self;
        spawn_local(async move {
            let outcome = api::analyze(&file).await;
            state.finish_analyze(&file, outcome);
            state.refresh_history();
        });
    }

    /// Apply the analyze outcome for `submitted`. The echoed image only
    /// replaces the preview if that file is still the staged one.
    fn finish_analyze(&self, submitted: &File, outcome: Result<AnalysisResult, String>) {
        match outcome {
            Ok(result) => {
                let unchanged = self.file.with_untracked(|current| {
                    current.as_ref().map_or(false, |current| {
                        let current: &JsValue = current.as_ref();
                        let submitted: &JsValue = submitted.as_ref();
                        current == submitted
                    })
                });
                if let Some(src) = result.image_src().filter(|_| unchanged) {
                    self.preview.set(Some(Preview::Echoed(src)));
                }
                self.result.set(Some(result));
            }
            Err(e) => {
                web_sys::console::error_1(&format!("Analysis failed: {}", e).into());
                self.error.set(Some(ANALYZE_FAILED_MESSAGE.to_string()));
            }
        }
        self.analyzing.set(false);
    }

    /// Re-fetch the history snapshot. Failures keep the current one.
    pub fn refresh_history(&self) {
        let history = self.history;
        spawn_local(async move {
            match api::fetch_history().await {
                Ok(entries) => history.set(entries),
                Err(e) => {
                    web_sys::console::warn_1(&format!("Failed to fetch history: {}", e).into());
                }
            }
        });
    }

    /// A pushed analysis replaces the live slot and refreshes history
    pub fn apply_live(&self, result: AnalysisResult) {
        self.live.set(Some(result));
        self.live_received_at
            .set(Some(chrono::Local::now().format("%H:%M:%S").to_string()));
        self.refresh_history();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn leaf_file(name: &str) -> File {
        let bits = js_sys::Array::of1(&js_sys::Uint8Array::from(&[0xFF, 0xD8, 0xFF, 0xE0][..]));
        File::new_with_u8_array_sequence(&bits, name).unwrap()
    }

    fn analysis(decision: &str, image: Option<&str>) -> AnalysisResult {
        AnalysisResult {
            decision: decision.to_string(),
            disease_name: "Leaf Rust".to_string(),
            reason: "Orange pustules".to_string(),
            treatment: "Remove infected leaves".to_string(),
            base64_image: image.map(str::to_string),
        }
    }

    fn preview_src(state: &PageState) -> Option<String> {
        state.preview.with_untracked(|preview| preview.as_ref().map(Preview::src))
    }

    #[wasm_bindgen_test]
    fn test_selection_clears_result_and_error() {
        let runtime = create_runtime();
        let state = PageState::new();
        state.result.set(Some(analysis("Healthy", None)));
        state.error.set(Some(ANALYZE_FAILED_MESSAGE.to_string()));

        state.submit_selection(leaf_file("leaf.png"));

        assert!(state.result.get_untracked().is_none());
        assert!(state.error.get_untracked().is_none());
        assert!(preview_src(&state).is_some_and(|src| src.starts_with("blob:")));
        assert!(state.can_analyze());
        runtime.dispose();
    }

    #[wasm_bindgen_test]
    fn test_unsupported_file_is_ignored() {
        let runtime = create_runtime();
        let state = PageState::new();

        state.submit_selection(leaf_file("notes.txt"));

        assert!(state.file.with_untracked(Option::is_none));
        assert!(preview_src(&state).is_none());
        assert!(!state.can_analyze());
        runtime.dispose();
    }

    #[wasm_bindgen_test]
    fn test_echo_replaces_preview() {
        let runtime = create_runtime();
        let state = PageState::new();
        let file = leaf_file("leaf.jpg");
        state.submit_selection(file.clone());
        state.analyzing.set(true);
        assert!(!state.can_analyze());

        state.finish_analyze(&file, Ok(analysis("Diseased", Some("AAEC"))));

        assert_eq!(preview_src(&state).as_deref(), Some("data:image/jpeg;base64,AAEC"));
        assert_eq!(state.result.get_untracked().map(|r| r.decision).as_deref(), Some("Diseased"));
        assert!(!state.analyzing.get_untracked());
        runtime.dispose();
    }

    #[wasm_bindgen_test]
    fn test_echo_skipped_after_reselection() {
        let runtime = create_runtime();
        let state = PageState::new();
        let first = leaf_file("first.jpg");
        state.submit_selection(first.clone());
        state.submit_selection(leaf_file("second.jpg"));
        let staged = preview_src(&state);

        state.finish_analyze(&first, Ok(analysis("Diseased", Some("AAEC"))));

        assert_eq!(preview_src(&state), staged);
        assert!(state.result.get_untracked().is_some());
        runtime.dispose();
    }

    #[wasm_bindgen_test]
    fn test_failure_keeps_result_and_sets_message() {
        let runtime = create_runtime();
        let state = PageState::new();
        let file = leaf_file("leaf.png");
        state.submit_selection(file.clone());
        state.result.set(Some(analysis("Healthy", None)));
        state.analyzing.set(true);

        state.finish_analyze(&file, Err("Server returned 500".to_string()));

        assert_eq!(state.error.get_untracked().as_deref(), Some(ANALYZE_FAILED_MESSAGE));
        assert_eq!(state.result.get_untracked().map(|r| r.decision).as_deref(), Some("Healthy"));
        assert!(state.can_analyze());
        runtime.dispose();
    }
}
