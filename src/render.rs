//! Pure render descriptions.
//!
//! Nothing here touches a UI toolkit: each function maps state to plain data
//! that a front end draws as it sees fit.

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

use crate::api::HistoryEntry;
use crate::chat::ChatMessage;
use crate::config::Config;
use crate::findings::{Confidence, Findings};
use crate::reveal::RevealFrame;
use crate::state::{AppState, Tab};

pub const HISTORY_LOADING_MESSAGE: &str = "Loading...";
pub const HISTORY_EMPTY_MESSAGE: &str = "No reports found";

/// Row stagger and bar timing for the findings list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTiming {
    pub stagger: Duration,
    pub bar_delay: Duration,
}

impl RenderTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stagger: config.finding_stagger(),
            bar_delay: config.bar_delay(),
        }
    }
}

impl Default for RenderTiming {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Probability bar that grows from `from_percent` to `to_percent` after `delay`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarAnimation {
    pub from_percent: f64,
    pub to_percent: f64,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingRow {
    pub name: String,
    /// Probability as a percentage, one decimal place, within [0, 100]
    pub percentage: f64,
    /// e.g. "91.0%"
    pub label: String,
    pub confidence: Option<Confidence>,
    /// Delay before the row slides in
    pub reveal_delay: Duration,
    pub bar: BarAnimation,
}

/// Probability in [0, 1] to a percentage rounded to one decimal place
pub fn percentage(probability: f64) -> f64 {
    if probability.is_nan() {
        return 0.0;
    }
    (probability.clamp(0.0, 1.0) * 1000.0).round() / 10.0
}

pub fn percentage_label(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

/// One row per finding, highest probability first
pub fn render_findings(findings: &Findings, timing: &RenderTiming) -> Vec<FindingRow> {
    findings
        .sorted_by_probability()
        .into_iter()
        .enumerate()
        .map(|(index, finding)| {
            let percentage = percentage(finding.probability);
            let step = timing.stagger * index as u32;
            FindingRow {
                name: finding.name.clone(),
                percentage,
                label: percentage_label(percentage),
                confidence: finding.confidence,
                reveal_delay: step,
                bar: BarAnimation {
                    from_percent: 0.0,
                    to_percent: percentage,
                    delay: timing.bar_delay + step,
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    /// Position in the result list, used to recall the entry
    pub index: usize,
    pub patient_name: String,
    pub exam_date: String,
}

/// What the history list shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HistoryPanel {
    /// Nothing requested yet
    #[default]
    Idle,
    Loading,
    Empty,
    Failed(String),
    Reports(Vec<HistoryRow>),
}

impl HistoryPanel {
    /// Placeholder text for non-list states
    pub fn message(&self) -> Option<&str> {
        match self {
            HistoryPanel::Loading => Some(HISTORY_LOADING_MESSAGE),
            HistoryPanel::Empty => Some(HISTORY_EMPTY_MESSAGE),
            HistoryPanel::Failed(message) => Some(message),
            HistoryPanel::Idle | HistoryPanel::Reports(_) => None,
        }
    }
}

pub fn render_history(entries: &[HistoryEntry]) -> HistoryPanel {
    if entries.is_empty() {
        return HistoryPanel::Empty;
    }
    HistoryPanel::Reports(
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| HistoryRow {
                index,
                patient_name: entry.patient_name.clone(),
                exam_date: entry.exam_date.clone(),
            })
            .collect(),
    )
}

/// Header date, e.g. "November 27, 2025"
pub fn report_date_label(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadView {
    pub file_name: Option<String>,
    pub preview: Option<String>,
    pub drop_zone_hover: bool,
    pub analyze_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub image_path: String,
    pub findings: Vec<FindingRow>,
    pub report_text: String,
    pub report_complete: bool,
    pub report_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    pub question_input: String,
    pub ask_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub query: String,
    pub panel: HistoryPanel,
}

/// Everything a front end needs to draw the page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub active_tab: Tab,
    pub upload: UploadView,
    pub loading_overlay: bool,
    pub scanning: bool,
    /// `None` while results are hidden
    pub results: Option<ResultsView>,
    pub chat: ChatView,
    pub history: HistoryView,
    /// Blocking alert waiting to be dismissed
    pub alert: Option<String>,
}

pub fn render_page(
    state: &AppState,
    report: &RevealFrame,
    timing: &RenderTiming,
    report_date: NaiveDate,
) -> PageView {
    let results = match state.results() {
        Some(results) if state.results_visible() => Some(ResultsView {
            image_path: results.image_path.clone(),
            findings: render_findings(&results.findings, timing),
            report_text: report.visible.clone(),
            report_complete: report.complete,
            report_date: report_date_label(report_date),
        }),
        _ => None,
    };

    PageView {
        active_tab: state.active_tab(),
        upload: UploadView {
            file_name: state.upload.file_name().map(str::to_string),
            preview: state.upload.preview().map(str::to_string),
            drop_zone_hover: state.upload.is_hovering(),
            analyze_enabled: state.can_analyze(),
        },
        loading_overlay: state.is_analyzing(),
        scanning: state.is_analyzing(),
        results,
        chat: ChatView {
            messages: state.chat.messages().to_vec(),
            question_input: state.chat.input().to_string(),
            ask_enabled: state.can_ask(),
        },
        history: HistoryView {
            query: state.history.query().to_string(),
            panel: state.history.panel().clone(),
        },
        alert: state.alert().map(str::to_string),
    }
}
