//! UI Components
//!
//! Leptos components for the detection page.

pub mod history;
pub mod loading;
pub mod realtime;
pub mod result;
pub mod status;
pub mod tabs;
pub mod upload;

pub use history::HistoryPanel;
pub use realtime::RealtimePanel;
pub use result::ResultPanel;
pub use status::StatusBadge;
pub use tabs::Tabs;
pub use upload::UploadPanel;
