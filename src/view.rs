//! Page Rendering
//!
//! Plain-text rendering of a [`PageSnapshot`]: status badge, upload panel,
//! result panel, tab bar and whichever of the real-time or history panels is
//! selected.

use std::fmt::{self, Write as _};

use crate::model::{AnalysisResult, ImageData, ViewMode};
use crate::state::PageSnapshot;
use crate::upload::UploadPolicy;

pub const PAGE_TITLE: &str = "Plant Leaf Disease Detection";
pub const RESULT_PLACEHOLDER: &str = "Upload an image and click Analyze to see the results";
pub const LIVE_TITLE: &str = "Real-time Analysis Feed";
pub const LIVE_PLACEHOLDER: &str = "Waiting for real-time analysis data...";
pub const HISTORY_PLACEHOLDER: &str = "No historical data available";

const RULE_WIDTH: usize = 60;
const URI_PREVIEW_LEN: usize = 48;

/// Renders one page state
pub struct PageView<'a> {
    page: &'a PageSnapshot,
    formats_hint: String,
}

impl<'a> PageView<'a> {
    pub fn new(page: &'a PageSnapshot) -> Self {
        Self {
            page,
            formats_hint: UploadPolicy::default().formats_hint(),
        }
    }

    /// Use the hint of a non-default upload policy
    pub fn with_policy(mut self, policy: &UploadPolicy) -> Self {
        self.formats_hint = policy.formats_hint();
        self
    }

    fn status_badge(&self) -> &'static str {
        if self.page.connected {
            "Connected"
        } else {
            "Disconnected"
        }
    }

    fn write_upload(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Upload")?;
        writeln!(f, "Drag files to upload")?;
        writeln!(f, "Or")?;
        writeln!(f, "[Browse Files]")?;
        writeln!(f, "{}", self.formats_hint)?;

        if let Some(file) = &self.page.staged_file {
            writeln!(f, "Staged: {}", file)?;
        }
        if let Some(preview) = &self.page.preview {
            let origin = if self.page.preview_echoed {
                "analyzed"
            } else {
                "local"
            };
            writeln!(f, "Preview ({}): {}", origin, abbreviate(preview, URI_PREVIEW_LEN))?;
        }

        let label = if self.page.analyzing {
            "Analyzing..."
        } else {
            "Analyze"
        };
        if self.page.can_analyze {
            writeln!(f, "[{}]", label)?;
        } else {
            writeln!(f, "[{}] (disabled)", label)?;
        }

        if let Some(error) = &self.page.error {
            writeln!(f, "Error: {}", error)?;
        }
        Ok(())
    }

    fn write_result(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Analysis Result")?;
        match &self.page.result {
            Some(result) => write_fields(f, result),
            None => writeln!(f, "{}", RESULT_PLACEHOLDER),
        }
    }

    fn write_tabs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tab = |mode: ViewMode| {
            if self.page.view == mode {
                format!("[{}]", mode.label())
            } else {
                format!(" {} ", mode.label())
            }
        };
        writeln!(f)?;
        writeln!(f, "{} | {}", tab(ViewMode::Realtime), tab(ViewMode::History))?;
        writeln!(f, "{}", "-".repeat(RULE_WIDTH))
    }

    fn write_live(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", LIVE_TITLE)?;
        match &self.page.live {
            Some(live) => write_fields(f, &AnalysisResult::from(live.clone())),
            None => writeln!(f, "{}", LIVE_PLACEHOLDER),
        }
    }

    fn write_history(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.page.history.is_empty() {
            return writeln!(f, "{}", HISTORY_PLACEHOLDER);
        }

        for (index, entry) in self.page.history.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            match &entry.id {
                Some(id) => writeln!(f, "#{} ({})", index + 1, id.as_str())?,
                None => writeln!(f, "#{}", index + 1)?,
            }
            write_fields(f, entry)?;
        }
        Ok(())
    }
}

impl fmt::Display for PageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  [{}]", PAGE_TITLE, self.status_badge())?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;

        self.write_upload(f)?;
        self.write_result(f)?;
        self.write_tabs(f)?;

        match self.page.view {
            ViewMode::Realtime => self.write_live(f),
            ViewMode::History => self.write_history(f),
        }
    }
}

/// Render a page with the default upload policy
pub fn render_page(page: &PageSnapshot) -> String {
    PageView::new(page).to_string()
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "-- {} --", title)
}

fn write_fields(f: &mut fmt::Formatter<'_>, result: &AnalysisResult) -> fmt::Result {
    writeln!(f, "Disease Name: {}", result.disease_name)?;
    writeln!(f, "Decision: {}", result.decision)?;
    writeln!(f, "Reason: {}", result.reason)?;
    writeln!(f, "Treatment: {}", result.treatment)?;
    if let Some(image) = &result.image {
        writeln!(f, "Image: {}", describe_image(image))?;
    }
    Ok(())
}

/// Short description of an embedded image
pub fn describe_image(image: &ImageData) -> String {
    match image.decode() {
        Ok(bytes) => format!(
            "{} bytes, {}",
            bytes.len(),
            abbreviate(&image.data_uri(), URI_PREVIEW_LEN)
        ),
        Err(e) => format!("undecodable ({})", e),
    }
}

fn abbreviate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let mut short: String = text.chars().take(max).collect();
    let _ = write!(short, "... ({} chars)", text.chars().count());
    short
}
