//! Browsing and searching previously generated reports.

use tracing::{debug, warn};

use crate::api::{ApiError, HistoryEntry};
use crate::render::{render_history, HistoryPanel};
use crate::state::{Generation, RequestToken};

/// Search query, latest results and the panel shown for them
#[derive(Debug, Default)]
pub struct HistoryBrowser {
    query: String,
    entries: Vec<HistoryEntry>,
    panel: HistoryPanel,
    generation: Generation,
}

impl HistoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a search; only the response for the newest search is applied
    pub fn begin_search(&mut self, query: &str) -> RequestToken {
        self.query = query.to_string();
        self.panel = HistoryPanel::Loading;
        self.generation.next()
    }

    /// Apply search results. Returns false for a superseded search.
    pub fn apply(&mut self, token: RequestToken, entries: Vec<HistoryEntry>) -> bool {
        if !self.generation.is_current(token) {
            debug!("Discarding stale history response");
            return false;
        }
        self.panel = render_history(&entries);
        self.entries = entries;
        true
    }

    /// Show a failed search. Returns false for a superseded search.
    pub fn fail(&mut self, token: RequestToken, error: &ApiError) -> bool {
        if !self.generation.is_current(token) {
            debug!("Discarding stale history failure: {}", error);
            return false;
        }
        warn!("History search failed: {}", error);
        self.entries.clear();
        self.panel = HistoryPanel::Failed(format!("Error: {}", error));
        true
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn panel(&self) -> &HistoryPanel {
        &self.panel
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }
}
