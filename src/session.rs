//! Detection Session
//!
//! One mounted detection page. A single task owns the [`DetectionState`] and
//! processes user commands, live channel events and request completions one
//! at a time. Requests run on a `JoinSet` owned by that task, so unmounting
//! aborts whatever is still in flight and closes the channel.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::api::{AnalysisService, ApiError, ApiResult};
use crate::channel::{ChannelError, ChannelEvent, ChannelHandle, ChannelSettings};
use crate::config::Config;
use crate::model::{AnalysisResult, HistoryEntry, ViewMode};
use crate::preview::PreviewStore;
use crate::state::{DetectionState, Effect, PageSnapshot, RefreshReason};
use crate::upload::{UploadError, UploadPolicy, UploadSelection};

const COMMAND_BUFFER: usize = 32;

/// User-side requests to the session
#[derive(Debug)]
enum Command {
    Select(UploadSelection),
    Analyze,
    SelectView(ViewMode),
    RefreshHistory,
    Unmount(oneshot::Sender<()>),
}

/// Finished request
enum Completion {
    Analyze(ApiResult<AnalysisResult>),
    History(ApiResult<Vec<HistoryEntry>>),
}

/// Mount a detection page: open the live channel and start the session
pub fn mount(
    config: &Config,
    service: Arc<dyn AnalysisService>,
) -> Result<SessionHandle, SessionError> {
    let settings = ChannelSettings::from_config(config)?;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let channel = ChannelHandle::open(settings, events_tx);

    Ok(spawn(
        service,
        UploadPolicy::from(&config.upload),
        Some(channel),
        events_rx,
    ))
}

/// Start a session on an already prepared event source
pub fn spawn(
    service: Arc<dyn AnalysisService>,
    policy: UploadPolicy,
    channel: Option<ChannelHandle>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshots_tx, snapshots_rx) = watch::channel(PageSnapshot::default());
    let previews = PreviewStore::new();

    let session = DetectionSession {
        state: DetectionState::new(),
        service,
        previews: previews.clone(),
        channel,
        events,
        events_open: true,
        commands: commands_rx,
        inflight: JoinSet::new(),
        snapshots: snapshots_tx,
    };
    let task = tokio::spawn(session.run());

    SessionHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
        previews,
        policy,
        task,
    }
}

struct DetectionSession {
    state: DetectionState,
    service: Arc<dyn AnalysisService>,
    previews: PreviewStore,
    channel: Option<ChannelHandle>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    events_open: bool,
    commands: mpsc::Receiver<Command>,
    inflight: JoinSet<Completion>,
    snapshots: watch::Sender<PageSnapshot>,
}

impl DetectionSession {
    async fn run(mut self) {
        tracing::info!("Session mounted");
        let effect = self.state.mount();
        self.dispatch(effect);
        self.publish();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Unmount(done)) => {
                        self.unmount().await;
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.unmount().await;
                        return;
                    }
                },
                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => {
                        let effect = self.state.apply_channel_event(event);
                        self.dispatch(effect);
                    }
                    None => {
                        tracing::debug!("Live channel event stream ended");
                        self.events_open = false;
                    }
                },
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => match joined {
                    Ok(completion) => self.complete(completion),
                    Err(e) => tracing::warn!(error = %e, "Request task failed"),
                },
            }
            self.publish();
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Select(selection) => {
                self.state.submit_selection(selection, &self.previews);
            }
            Command::Analyze => match self.state.begin_analyze() {
                Some(upload) => {
                    let service = Arc::clone(&self.service);
                    self.inflight.spawn(async move {
                        let outcome = AssertUnwindSafe(service.analyze(&upload))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| Err(ApiError::TaskFailed(panic_message(&*panic))));
                        Completion::Analyze(outcome)
                    });
                }
                None => tracing::debug!("Analyze ignored: nothing staged or already analyzing"),
            },
            Command::SelectView(view) => {
                self.state.select_view(view);
            }
            Command::RefreshHistory => {
                self.dispatch(Some(Effect::RefreshHistory(RefreshReason::Manual)));
            }
            Command::Unmount(_) => {}
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Analyze(outcome) => {
                let effect = self.state.complete_analyze(outcome);
                self.dispatch(effect);
            }
            Completion::History(outcome) => self.state.apply_history(outcome),
        }
    }

    fn dispatch(&mut self, effect: Option<Effect>) {
        let Some(Effect::RefreshHistory(reason)) = effect else {
            return;
        };

        tracing::debug!(reason = ?reason, "Refreshing history");
        let service = Arc::clone(&self.service);
        self.inflight
            .spawn(async move { Completion::History(service.history().await) });
    }

    fn publish(&self) {
        let next = self.state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    async fn unmount(&mut self) {
        let pending = self.inflight.len();
        self.inflight.abort_all();
        while self.inflight.join_next().await.is_some() {}

        if let Some(channel) = self.channel.take() {
            if channel.is_finished() {
                tracing::debug!("Live channel had already stopped");
            }
            channel.close().await;
        }
        self.events.close();

        self.state.release();
        self.publish();
        tracing::info!(aborted = pending, "Session unmounted");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "analysis panicked".to_string()
    }
}

/// Handle to a mounted session
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<PageSnapshot>,
    previews: PreviewStore,
    policy: UploadPolicy,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Stage an in-memory file
    pub async fn select(&self, selection: UploadSelection) -> Result<(), SessionError> {
        self.send(Command::Select(selection)).await
    }

    /// Stage a file from disk, subject to the extension filter
    pub async fn stage_file(&self, path: &Path) -> Result<(), SessionError> {
        let selection = UploadSelection::load(path, &self.policy).await?;
        self.select(selection).await
    }

    /// Stage the single file of a drop. Rejected drops leave the page as is.
    pub async fn drop_files(&self, paths: &[PathBuf]) -> Result<(), SessionError> {
        let path = self.policy.pick(paths)?;
        self.stage_file(path).await
    }

    /// Submit the staged file. Ignored when nothing is staged or an
    /// analysis is already running.
    pub async fn analyze(&self) -> Result<(), SessionError> {
        self.send(Command::Analyze).await
    }

    pub async fn select_view(&self, view: ViewMode) -> Result<(), SessionError> {
        self.send(Command::SelectView(view)).await
    }

    pub async fn refresh_history(&self) -> Result<(), SessionError> {
        self.send(Command::RefreshHistory).await
    }

    /// Latest published page state
    pub fn snapshot(&self) -> PageSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every page change
    pub fn subscribe(&self) -> watch::Receiver<PageSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the page satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&PageSnapshot) -> bool,
    ) -> Result<PageSnapshot, SessionError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Tear the page down and wait until the channel is closed
    pub async fn unmount(self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Unmount(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session task ended abnormally");
        }
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Session is no longer mounted")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::channel::{ChannelStatus, DisconnectReason};
    use crate::model::{ImageData, LiveAnalysisResult};
    use crate::state::ANALYZE_FAILED_MESSAGE;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeService {
        analyze_reply: Mutex<Option<AnalysisResult>>,
        history_reply: Mutex<Option<Vec<HistoryEntry>>>,
        analyze_gate: Option<Arc<Notify>>,
        analyze_panics: AtomicBool,
        analyze_calls: AtomicUsize,
        history_calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn analyze(&self, _upload: &UploadSelection) -> ApiResult<AnalysisResult> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.analyze_gate {
                gate.notified().await;
            }
            if self.analyze_panics.load(Ordering::SeqCst) {
                panic!("model backend crashed");
            }
            self.analyze_reply
                .lock()
                .unwrap()
                .clone()
                .ok_or(ApiError::Status {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
        }

        async fn history(&self) -> ApiResult<Vec<HistoryEntry>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.history_reply
                .lock()
                .unwrap()
                .clone()
                .ok_or(ApiError::Unavailable)
        }
    }

    fn analysis(decision: &str, image: Option<&[u8]>) -> AnalysisResult {
        AnalysisResult {
            id: None,
            decision: decision.to_string(),
            disease_name: "Leaf Rust".to_string(),
            reason: "Orange pustules".to_string(),
            treatment: "Remove infected leaves".to_string(),
            image: image.map(ImageData::from_bytes),
        }
    }

    fn start(
        service: Arc<FakeService>,
    ) -> (SessionHandle, mpsc::UnboundedSender<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = spawn(service, UploadPolicy::default(), None, events_rx);
        (handle, events_tx)
    }

    async fn wait(
        handle: &SessionHandle,
        predicate: impl FnMut(&PageSnapshot) -> bool,
    ) -> PageSnapshot {
        tokio::time::timeout(Duration::from_secs(5), handle.wait_for(predicate))
            .await
            .expect("timed out waiting for page state")
            .unwrap()
    }

    #[tokio::test]
    async fn test_mount_fetches_history() {
        let service = Arc::new(FakeService {
            history_reply: Mutex::new(Some(vec![analysis("Healthy", None)])),
            ..Default::default()
        });
        let (handle, _events) = start(service.clone());

        let page = wait(&handle, |page| page.history.len() == 1).await;
        assert_eq!(page.history[0].decision, "Healthy");
        assert_eq!(service.history_calls.load(Ordering::SeqCst), 1);

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_analyze_without_file_sends_nothing() {
        let service = Arc::new(FakeService::default());
        let (handle, _events) = start(service.clone());

        handle.analyze().await.unwrap();
        handle.select_view(ViewMode::History).await.unwrap();
        let page = wait(&handle, |page| page.view == ViewMode::History).await;

        assert!(!page.analyzing);
        assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 0);
        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_analyze_success_shows_echo_and_refreshes_history() {
        let service = Arc::new(FakeService {
            analyze_reply: Mutex::new(Some(analysis("Diseased", Some(&[4, 5, 6])))),
            history_reply: Mutex::new(Some(vec![analysis("Healthy", None)])),
            ..Default::default()
        });
        let (handle, _events) = start(service.clone());
        wait(&handle, |page| page.history.len() == 1).await;

        handle
            .select(UploadSelection::from_bytes("leaf.jpg", vec![1, 2, 3]))
            .await
            .unwrap();
        let staged = wait(&handle, |page| page.staged_file.is_some()).await;
        assert!(staged.preview.unwrap().starts_with("blob:"));
        assert_eq!(handle.previews().live_count(), 1);

        *service.history_reply.lock().unwrap() = Some(vec![
            analysis("Healthy", None),
            analysis("Diseased", Some(&[4, 5, 6])),
        ]);
        handle.analyze().await.unwrap();
        let page = wait(&handle, |page| page.result.is_some()).await;

        assert!(!page.analyzing);
        assert!(page.preview_echoed);
        assert_eq!(
            page.preview.as_deref(),
            Some(ImageData::from_bytes(&[4, 5, 6]).data_uri().as_str())
        );
        assert_eq!(handle.previews().live_count(), 0);

        wait(&handle, |page| page.history.len() == 2).await;
        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_manual_refresh_replaces_history() {
        let service = Arc::new(FakeService {
            history_reply: Mutex::new(Some(vec![analysis("Healthy", None)])),
            ..Default::default()
        });
        let (handle, _events) = start(service.clone());
        wait(&handle, |page| page.history.len() == 1).await;

        *service.history_reply.lock().unwrap() = Some(vec![]);
        handle.refresh_history().await.unwrap();
        wait(&handle, |page| page.history.is_empty()).await;

        *service.history_reply.lock().unwrap() = None;
        handle.refresh_history().await.unwrap();
        handle.select_view(ViewMode::History).await.unwrap();
        let page = wait(&handle, |page| page.view == ViewMode::History).await;
        assert!(page.history.is_empty());

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_analyze_failure_sets_error() {
        let service = Arc::new(FakeService::default());
        let (handle, _events) = start(service.clone());

        handle
            .select(UploadSelection::from_bytes("leaf.jpg", vec![1]))
            .await
            .unwrap();
        handle.analyze().await.unwrap();

        let page = wait(&handle, |page| page.error.is_some()).await;
        assert_eq!(page.error.as_deref(), Some(ANALYZE_FAILED_MESSAGE));
        assert!(page.result.is_none());
        assert!(!page.analyzing);
        assert!(page.can_analyze);

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_crashed_analysis_clears_busy_flag() {
        let service = Arc::new(FakeService {
            analyze_reply: Mutex::new(Some(analysis("Healthy", None))),
            analyze_panics: AtomicBool::new(true),
            ..Default::default()
        });
        let (handle, _events) = start(service.clone());

        handle
            .select(UploadSelection::from_bytes("leaf.jpg", vec![1]))
            .await
            .unwrap();
        handle.analyze().await.unwrap();

        let page = wait(&handle, |page| page.error.is_some()).await;
        assert_eq!(page.error.as_deref(), Some(ANALYZE_FAILED_MESSAGE));
        assert!(!page.analyzing);
        assert!(page.can_analyze);

        service.analyze_panics.store(false, Ordering::SeqCst);
        handle.analyze().await.unwrap();
        let page = wait(&handle, |page| page.result.is_some()).await;
        assert!(page.error.is_none());
        assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 2);

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_busy_flag_allows_one_request() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService {
            analyze_reply: Mutex::new(Some(analysis("Healthy", None))),
            analyze_gate: Some(gate.clone()),
            ..Default::default()
        });
        let (handle, _events) = start(service.clone());

        handle
            .select(UploadSelection::from_bytes("leaf.png", vec![1]))
            .await
            .unwrap();
        handle.analyze().await.unwrap();
        handle.analyze().await.unwrap();
        handle.analyze().await.unwrap();

        let page = wait(&handle, |page| page.analyzing).await;
        assert!(!page.can_analyze);

        gate.notify_one();
        wait(&handle, |page| page.result.is_some()).await;
        assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 1);

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_live_result_replaces_slot_and_refreshes_history() {
        let service = Arc::new(FakeService {
            history_reply: Mutex::new(Some(vec![analysis("Healthy", None)])),
            ..Default::default()
        });
        let (handle, events) = start(service.clone());
        wait(&handle, |page| page.history.len() == 1).await;

        events
            .send(ChannelEvent::Connected {
                sid: Some("abc".to_string()),
            })
            .unwrap();
        wait(&handle, |page| page.connected).await;

        *service.history_reply.lock().unwrap() =
            Some(vec![analysis("Healthy", None), analysis("reject", None)]);
        for decision in ["first", "second"] {
            events
                .send(ChannelEvent::Result(LiveAnalysisResult {
                    id: None,
                    decision: decision.to_string(),
                    disease_name: "Blight".to_string(),
                    reason: "lesion pattern".to_string(),
                    treatment: "fungicide X".to_string(),
                    image: ImageData::from_bytes(&[1, 2]),
                }))
                .unwrap();
        }

        let page = wait(&handle, |page| {
            page.history.len() == 2
                && page.live.as_ref().is_some_and(|live| live.decision == "second")
        })
        .await;
        assert!(page.connected);

        events
            .send(ChannelEvent::Disconnected {
                reason: DisconnectReason::TransportClose,
            })
            .unwrap();
        wait(&handle, |page| page.channel == ChannelStatus::Disconnected).await;

        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_rejected_drop_leaves_page_untouched() {
        let service = Arc::new(FakeService::default());
        let (handle, _events) = start(service);

        let err = handle
            .drop_files(&[PathBuf::from("notes.txt")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Upload(UploadError::UnsupportedExtension { .. })
        ));

        let err = handle
            .drop_files(&[PathBuf::from("a.png"), PathBuf::from("b.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Upload(UploadError::TooManyFiles(2))));

        assert!(handle.snapshot().staged_file.is_none());
        handle.unmount().await;
    }

    #[tokio::test]
    async fn test_unmount_aborts_inflight_request() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService {
            analyze_gate: Some(gate),
            ..Default::default()
        });
        let (handle, events) = start(service);

        handle
            .select(UploadSelection::from_bytes("leaf.png", vec![1]))
            .await
            .unwrap();
        handle.analyze().await.unwrap();
        wait(&handle, |page| page.analyzing).await;

        let previews = handle.previews().clone();
        let snapshots = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), handle.unmount())
            .await
            .expect("unmount hung on in-flight request");

        assert_eq!(previews.live_count(), 0);
        assert!(snapshots.borrow().staged_file.is_none());
        assert!(events.is_closed());
    }
}
