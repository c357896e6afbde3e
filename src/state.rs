//! Page state container.
//!
//! All mutable page state lives in [`AppState`] and changes only through its
//! methods. Requests that can replace what is on screen are sequenced with
//! generation counters so a late response cannot overwrite newer state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{AnalysisResult, AnalysisUpload, HistoryEntry};
use crate::chat::{ChatController, PendingQuestion};
use crate::findings::Findings;
use crate::history::HistoryBrowser;
use crate::upload::UploadController;

/// Identifies the request a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Monotonic request counter
#[derive(Debug, Default)]
pub struct Generation(u64);

impl Generation {
    /// Increment generation and return a token for the new value
    pub fn next(&mut self) -> RequestToken {
        self.0 = self.0.wrapping_add(1);
        RequestToken(self.0)
    }

    pub fn current(&self) -> RequestToken {
        RequestToken(self.0)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    NewReport,
    History,
}

/// Exam metadata sent with the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamForm {
    pub clinical_indication: String,
    /// `YYYY-MM-DD`
    pub exam_date: String,
    pub patient_name: String,
}

impl ExamForm {
    /// Empty form dated `today`
    pub fn dated(today: NaiveDate) -> Self {
        Self {
            clinical_indication: String::new(),
            exam_date: today.format("%Y-%m-%d").to_string(),
            patient_name: String::new(),
        }
    }

    /// Patient name to send, falling back to `default` when blank
    pub fn patient_name_or<'a>(&'a self, default: &'a str) -> &'a str {
        let name = self.patient_name.trim();
        if name.is_empty() {
            default
        } else {
            name
        }
    }
}

/// Results currently loaded into the main view
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedResults {
    pub image_path: String,
    pub findings: Findings,
    pub report: String,
}

#[derive(Debug)]
pub struct AppState {
    pub upload: UploadController,
    pub form: ExamForm,
    pub chat: ChatController,
    pub history: HistoryBrowser,
    current_image_path: Option<String>,
    results: Option<DisplayedResults>,
    results_visible: bool,
    analyzing: bool,
    active_tab: Tab,
    alert: Option<String>,
    /// Bumped by every request that may replace the results
    results_generation: Generation,
    /// Bumped whenever a different image is put on screen
    image_generation: Generation,
}

impl AppState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            upload: UploadController::new(),
            form: ExamForm::dated(today),
            chat: ChatController::new(),
            history: HistoryBrowser::new(),
            current_image_path: None,
            results: None,
            results_visible: false,
            analyzing: false,
            active_tab: Tab::NewReport,
            alert: None,
            results_generation: Generation::default(),
            image_generation: Generation::default(),
        }
    }

    pub fn current_image_path(&self) -> Option<&str> {
        self.current_image_path.as_deref()
    }

    pub fn results(&self) -> Option<&DisplayedResults> {
        self.results.as_ref()
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible && self.results.is_some()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn raise_alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("Alert: {}", message);
        self.alert = Some(message);
    }

    pub fn dismiss_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    /// Analyze is enabled with a pending file and no analysis in flight
    pub fn can_analyze(&self) -> bool {
        self.upload.has_file() && !self.analyzing
    }

    pub fn can_ask(&self) -> bool {
        self.chat.can_ask(self.current_image_path())
    }

    /// Enter the loading state and package the upload.
    ///
    /// Returns `None` (and changes nothing) without a pending file or while
    /// another analysis is in flight.
    pub fn begin_analysis(&mut self, default_patient_name: &str) -> Option<(RequestToken, AnalysisUpload)> {
        if self.analyzing {
            debug!("Analyze ignored: analysis already in flight");
            return None;
        }
        let file = match self.upload.pending() {
            Some(file) => file.clone(),
            None => {
                debug!("Analyze ignored: no file selected");
                return None;
            }
        };

        let upload = AnalysisUpload {
            file,
            clinical_indication: self.form.clinical_indication.clone(),
            date: self.form.exam_date.clone(),
            patient_name: self.form.patient_name_or(default_patient_name).to_string(),
        };

        self.analyzing = true;
        self.results_visible = false;
        Some((self.results_generation.next(), upload))
    }

    /// Leave the loading state; runs whatever the outcome
    pub fn finish_analysis(&mut self) {
        self.analyzing = false;
        // A failed analysis leaves earlier results on screen
        self.results_visible = self.results.is_some();
    }

    /// Load a fresh analysis. Returns false for a superseded request.
    pub fn apply_analysis(&mut self, token: RequestToken, result: &AnalysisResult) -> bool {
        if !self.results_generation.is_current(token) {
            debug!("Discarding stale analysis for {}", result.image_path);
            return false;
        }
        info!("Showing analysis for {}", result.image_path);
        self.show(DisplayedResults {
            image_path: result.image_path.clone(),
            findings: result.cv_findings.clone(),
            report: result.medical_report.clone(),
        });
        true
    }

    /// Report a failed analysis. Returns false for a superseded request.
    pub fn fail_analysis(&mut self, token: RequestToken, message: impl Into<String>) -> bool {
        if !self.results_generation.is_current(token) {
            debug!("Discarding failure of a superseded analysis");
            return false;
        }
        self.raise_alert(message);
        true
    }

    /// Load a stored report; supersedes any analysis in flight
    pub fn apply_recalled(&mut self, entry: &HistoryEntry, findings: Findings) {
        self.results_generation.next();
        info!("Recalling stored report for {}", entry.image_path);
        self.show(DisplayedResults {
            image_path: entry.image_path.clone(),
            findings,
            report: entry.report_text.clone(),
        });
        self.active_tab = Tab::NewReport;
    }

    fn show(&mut self, results: DisplayedResults) {
        self.current_image_path = Some(results.image_path.clone());
        self.results = Some(results);
        self.results_visible = true;
        self.image_generation.next();
        self.chat.clear();
    }

    /// Send the question input for the current image
    pub fn begin_question(&mut self) -> Option<PendingQuestion> {
        let token = self.image_generation.current();
        let image_path = self.current_image_path.clone();
        self.chat.begin(image_path.as_deref(), token)
    }

    /// Append a reply unless the results it was asked about were replaced
    pub fn apply_reply(&mut self, token: RequestToken, text: impl Into<String>) -> bool {
        if !self.image_generation.is_current(token) {
            debug!("Discarding reply for an image no longer on screen");
            return false;
        }
        self.chat.record_reply(text);
        true
    }
}
