//! Detection Page State
//!
//! Everything the detection page holds, and the transitions that change it.
//! Transitions are plain synchronous methods; the ones that should trigger
//! follow-up work return an [`Effect`] instead of performing it, so the
//! history refresh rule is visible and testable on its own.

use serde::Serialize;

use crate::api::{ApiError, ApiResult};
use crate::channel::{ChannelEvent, ChannelStatus};
use crate::model::{AnalysisResult, HistoryEntry, ImageData, LiveAnalysisResult, ViewMode};
use crate::preview::{Preview, PreviewStore};
use crate::upload::UploadSelection;

/// Message shown when an analysis request fails, whatever the cause
pub const ANALYZE_FAILED_MESSAGE: &str = "Failed to analyze image. Please try again.";

/// Why a history refresh was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    Mount,
    AnalyzeCompleted,
    LiveResult,
    Manual,
}

/// Follow-up work requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-fetch the full history snapshot
    RefreshHistory(RefreshReason),
}

/// State of one detection page
#[derive(Debug, Default)]
pub struct DetectionState {
    selection: Option<UploadSelection>,
    /// Bumped on every accepted selection
    selection_generation: u64,
    /// Generation of the selection being analyzed
    analyzing_generation: Option<u64>,
    preview: Option<Preview>,
    result: Option<AnalysisResult>,
    error: Option<String>,
    channel: ChannelStatus,
    live: Option<LiveAnalysisResult>,
    view: ViewMode,
    history: Vec<HistoryEntry>,
    mounted: bool,
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page became visible. Schedules the initial history fetch once.
    pub fn mount(&mut self) -> Option<Effect> {
        if self.mounted {
            return None;
        }
        self.mounted = true;
        Some(Effect::RefreshHistory(RefreshReason::Mount))
    }

    /// Stage a new file. Clears the previous result and error and replaces
    /// the preview, which releases the previous preview reference.
    pub fn submit_selection(&mut self, selection: UploadSelection, previews: &PreviewStore) {
        tracing::info!(
            file = %selection.file_name(),
            size = selection.len(),
            "File staged"
        );

        self.result = None;
        self.error = None;
        self.preview = Some(Preview::Staged(previews.create(&selection)));
        self.selection = Some(selection);
        self.selection_generation += 1;
    }

    pub fn can_analyze(&self) -> bool {
        self.selection.is_some() && !self.is_analyzing()
    }

    /// Start an analysis. Returns the upload to send, or `None` when nothing
    /// is staged or a request is already in flight.
    pub fn begin_analyze(&mut self) -> Option<UploadSelection> {
        if !self.can_analyze() {
            return None;
        }
        let selection = self.selection.clone()?;

        self.analyzing_generation = Some(self.selection_generation);
        self.error = None;
        tracing::info!(file = %selection.file_name(), "Analyzing");
        Some(selection)
    }

    /// Finish the in-flight analysis
    pub fn complete_analyze(&mut self, outcome: ApiResult<AnalysisResult>) -> Option<Effect> {
        let generation = self.analyzing_generation.take()?;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    decision = %result.decision,
                    disease = %result.disease_name,
                    "Analysis complete"
                );

                let echoed = result.image.as_ref().filter(|image| !image.is_empty());
                if let Some(image) = echoed {
                    if generation == self.selection_generation {
                        self.show_echo(image.clone());
                    } else {
                        tracing::debug!("Selection changed during analysis, keeping its preview");
                    }
                }
                self.result = Some(result);
            }
            Err(e) => {
                log_analyze_failure(&e);
                self.error = Some(ANALYZE_FAILED_MESSAGE.to_string());
            }
        }

        Some(Effect::RefreshHistory(RefreshReason::AnalyzeCompleted))
    }

    fn show_echo(&mut self, image: ImageData) {
        self.preview = Some(Preview::Echoed(image));
    }

    /// Apply an event from the live channel
    pub fn apply_channel_event(&mut self, event: ChannelEvent) -> Option<Effect> {
        match event {
            ChannelEvent::Result(live) => {
                tracing::info!(
                    decision = %live.decision,
                    disease = %live.disease_name,
                    "Live result received"
                );
                self.live = Some(live);
                Some(Effect::RefreshHistory(RefreshReason::LiveResult))
            }
            other => {
                if let Some(status) = other.status() {
                    self.channel = status;
                }
                None
            }
        }
    }

    /// Apply the outcome of a history fetch. Failures keep the previous
    /// snapshot.
    pub fn apply_history(&mut self, outcome: ApiResult<Vec<HistoryEntry>>) {
        match outcome {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "History refreshed");
                self.history = entries;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch history");
            }
        }
    }

    /// Switch the lower panel. Returns whether anything changed.
    pub fn select_view(&mut self, view: ViewMode) -> bool {
        if self.view == view {
            return false;
        }
        self.view = view;
        true
    }

    /// Page went away: drop the staged file and its preview
    pub fn release(&mut self) {
        self.selection = None;
        self.preview = None;
        self.analyzing_generation = None;
        self.channel = ChannelStatus::Disconnected;
        self.mounted = false;
    }

    pub fn selection(&self) -> Option<&UploadSelection> {
        self.selection.as_ref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing_generation.is_some()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn channel(&self) -> ChannelStatus {
        self.channel
    }

    pub fn live(&self) -> Option<&LiveAnalysisResult> {
        self.live.as_ref()
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Owned copy of what the page currently shows
    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            channel: self.channel,
            connected: self.channel.is_connected(),
            staged_file: self.selection.as_ref().map(|s| s.file_name().to_string()),
            preview: self.preview.as_ref().map(Preview::source),
            preview_echoed: self.preview.as_ref().is_some_and(Preview::is_echoed),
            analyzing: self.is_analyzing(),
            can_analyze: self.can_analyze(),
            result: self.result.clone(),
            error: self.error.clone(),
            view: self.view,
            live: self.live.clone(),
            history: self.history.clone(),
        }
    }
}

fn log_analyze_failure(error: &ApiError) {
    match error.status() {
        Some(status) => tracing::warn!(status, error = %error, "Analysis rejected by server"),
        None => tracing::warn!(error = %error, "Analysis request failed"),
    }
}

/// What the page shows at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub channel: ChannelStatus,
    pub connected: bool,
    pub staged_file: Option<String>,
    /// Displayable image source for the upload panel
    pub preview: Option<String>,
    pub preview_echoed: bool,
    pub analyzing: bool,
    pub can_analyze: bool,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub view: ViewMode,
    pub live: Option<LiveAnalysisResult>,
    pub history: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DisconnectReason;

    fn analysis(decision: &str, image: Option<&[u8]>) -> AnalysisResult {
        AnalysisResult {
            id: None,
            decision: decision.to_string(),
            disease_name: "Early Blight".to_string(),
            reason: "Concentric rings".to_string(),
            treatment: "Copper fungicide".to_string(),
            image: image.map(ImageData::from_bytes),
        }
    }

    fn live(decision: &str) -> LiveAnalysisResult {
        LiveAnalysisResult {
            id: None,
            decision: decision.to_string(),
            disease_name: "Blight".to_string(),
            reason: "lesion pattern".to_string(),
            treatment: "fungicide X".to_string(),
            image: ImageData::from_bytes(&[9, 9]),
        }
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    }

    fn staged(state: &mut DetectionState, previews: &PreviewStore, name: &str) {
        state.submit_selection(UploadSelection::from_bytes(name, vec![1, 2, 3]), previews);
    }

    #[test]
    fn test_mount_schedules_history_once() {
        let mut state = DetectionState::new();
        assert_eq!(
            state.mount(),
            Some(Effect::RefreshHistory(RefreshReason::Mount))
        );
        assert_eq!(state.mount(), None);
    }

    #[test]
    fn test_selection_clears_result_and_error() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();

        staged(&mut state, &previews, "first.png");
        state.begin_analyze().unwrap();
        state.complete_analyze(Err(server_error()));
        assert!(state.error().is_some());

        staged(&mut state, &previews, "second.jpg");
        assert!(state.error().is_none());
        assert!(state.result().is_none());

        let preview = state.preview().unwrap().source();
        assert!(!preview.is_empty());
        assert_eq!(state.selection().unwrap().file_name(), "second.jpg");
    }

    #[test]
    fn test_new_selection_releases_previous_preview() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();

        for i in 0..5 {
            staged(&mut state, &previews, &format!("leaf{}.png", i));
        }
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn test_analyze_without_selection_is_noop() {
        let mut state = DetectionState::new();
        assert!(state.begin_analyze().is_none());
        assert!(!state.is_analyzing());
        assert_eq!(state.complete_analyze(Ok(analysis("Healthy", None))), None);
        assert!(state.result().is_none());
    }

    #[test]
    fn test_busy_flag_blocks_reentry() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.png");

        assert!(state.begin_analyze().is_some());
        assert!(state.is_analyzing());
        assert!(!state.can_analyze());
        assert!(state.begin_analyze().is_none());
    }

    #[test]
    fn test_success_replaces_preview_with_echo() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.jpg");
        assert_eq!(previews.live_count(), 1);

        state.begin_analyze().unwrap();
        let effect = state.complete_analyze(Ok(analysis("Diseased", Some(&[7, 7, 7]))));

        assert_eq!(
            effect,
            Some(Effect::RefreshHistory(RefreshReason::AnalyzeCompleted))
        );
        assert!(!state.is_analyzing());
        assert_eq!(
            state.preview().unwrap().source(),
            ImageData::from_bytes(&[7, 7, 7]).data_uri()
        );
        assert_eq!(previews.live_count(), 0);
        assert_eq!(state.result().unwrap().decision, "Diseased");
    }

    #[test]
    fn test_success_without_image_keeps_staged_preview() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.jpg");
        let before = state.preview().unwrap().source();

        state.begin_analyze().unwrap();
        state.complete_analyze(Ok(analysis("Healthy", None)));

        assert_eq!(state.preview().unwrap().source(), before);
        assert!(!state.preview().unwrap().is_echoed());
    }

    #[test]
    fn test_echo_ignored_when_selection_changed_midway() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "first.jpg");
        state.begin_analyze().unwrap();

        staged(&mut state, &previews, "second.jpg");
        let staged_preview = state.preview().unwrap().source();
        state.complete_analyze(Ok(analysis("Diseased", Some(&[1]))));

        assert_eq!(state.preview().unwrap().source(), staged_preview);
        assert_eq!(state.result().unwrap().decision, "Diseased");
    }

    #[test]
    fn test_failure_keeps_previous_result() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.jpg");

        state.begin_analyze().unwrap();
        state.complete_analyze(Ok(analysis("Diseased", None)));
        let previous = state.result().cloned();

        state.begin_analyze().unwrap();
        let effect = state.complete_analyze(Err(server_error()));

        assert_eq!(
            effect,
            Some(Effect::RefreshHistory(RefreshReason::AnalyzeCompleted))
        );
        assert_eq!(state.result().cloned(), previous);
        assert_eq!(state.error(), Some(ANALYZE_FAILED_MESSAGE));
        assert!(!state.is_analyzing());
    }

    #[test]
    fn test_begin_analyze_clears_error() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.jpg");

        state.begin_analyze().unwrap();
        state.complete_analyze(Err(ApiError::Unavailable));
        assert!(state.error().is_some());

        state.begin_analyze().unwrap();
        assert!(state.error().is_none());
    }

    #[test]
    fn test_live_result_last_event_wins() {
        let mut state = DetectionState::new();

        assert_eq!(
            state.apply_channel_event(ChannelEvent::Result(live("first"))),
            Some(Effect::RefreshHistory(RefreshReason::LiveResult))
        );
        state.apply_channel_event(ChannelEvent::Result(live("second")));

        assert_eq!(state.live().unwrap().decision, "second");
    }

    #[test]
    fn test_channel_status_follows_events() {
        let mut state = DetectionState::new();
        assert_eq!(state.channel(), ChannelStatus::Disconnected);

        assert_eq!(
            state.apply_channel_event(ChannelEvent::Connecting { attempt: 0 }),
            None
        );
        assert_eq!(state.channel(), ChannelStatus::Connecting);

        state.apply_channel_event(ChannelEvent::Connected { sid: None });
        assert!(state.snapshot().connected);

        state.apply_channel_event(ChannelEvent::Disconnected {
            reason: DisconnectReason::TransportClose,
        });
        assert!(!state.snapshot().connected);
    }

    #[test]
    fn test_history_failure_keeps_snapshot() {
        let mut state = DetectionState::new();
        state.apply_history(Ok(vec![
            analysis("Healthy", None),
            analysis("Healthy", None),
        ]));
        let before = state.history().to_vec();

        state.apply_history(Err(ApiError::Timeout));
        assert_eq!(state.history(), &before[..]);

        state.apply_history(Ok(vec![]));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_select_view_has_no_effect_besides_mode() {
        let mut state = DetectionState::new();
        let before = state.snapshot();

        assert!(state.select_view(ViewMode::History));
        assert!(!state.select_view(ViewMode::History));

        let after = state.snapshot();
        assert_eq!(after.view, ViewMode::History);
        assert_eq!(
            PageSnapshot {
                view: ViewMode::Realtime,
                ..after
            },
            before
        );
    }

    #[test]
    fn test_release_revokes_preview() {
        let previews = PreviewStore::new();
        let mut state = DetectionState::new();
        staged(&mut state, &previews, "leaf.png");

        state.release();
        assert_eq!(previews.live_count(), 0);
        assert!(state.selection().is_none());
    }
}
