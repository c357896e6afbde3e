//! The report page: one method per user action.
//!
//! A [`Workspace`] owns the page state, the backend handle and the report
//! reveal. Front ends call its methods from their event handlers and redraw
//! from [`Workspace::view`]. State is behind a `std::sync::Mutex` that is
//! never held across an `.await`.

use chrono::{Local, NaiveDate};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, HistoryEntry, ReportBackend};
use crate::config::Config;
use crate::findings::Findings;
use crate::render::{render_page, PageView, RenderTiming};
use crate::reveal::TextReveal;
use crate::state::{AppState, Tab};
use crate::upload::SelectedFile;

pub struct Workspace {
    backend: Arc<dyn ReportBackend>,
    config: Config,
    timing: RenderTiming,
    today: NaiveDate,
    state: Mutex<AppState>,
    report: TextReveal,
}

/// Clears the loading overlay when the analysis future ends, however it ends
struct LoadingGuard<'a> {
    state: &'a Mutex<AppState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).finish_analysis();
    }
}

/// Re-enables Ask when the question future ends
struct AskingGuard<'a> {
    state: &'a Mutex<AppState>,
}

impl Drop for AskingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).chat.finish();
    }
}

fn lock(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl Workspace {
    pub fn new(backend: Arc<dyn ReportBackend>, config: Config) -> Self {
        Self::with_date(backend, config, Local::now().date_naive())
    }

    /// Build a workspace whose exam date and report header use `today`
    pub fn with_date(backend: Arc<dyn ReportBackend>, config: Config, today: NaiveDate) -> Self {
        Self {
            backend,
            timing: RenderTiming::from_config(&config),
            config,
            today,
            state: Mutex::new(AppState::new(today)),
            report: TextReveal::new(),
        }
    }

    /// Workspace talking to the configured analysis service
    pub fn connect(config: Config) -> Result<Self, ApiError> {
        let client = ApiClient::new(&config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn report_reveal(&self) -> &TextReveal {
        &self.report
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        lock(&self.state)
    }

    /// Render description of the whole page
    pub fn view(&self) -> PageView {
        let state = self.state();
        let frame = self.report.snapshot();
        render_page(&state, &frame, &self.timing, self.today)
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Take a file from the file browser or any other source
    pub fn select_file(&self, file: SelectedFile) -> bool {
        self.state().upload.accept(file)
    }

    /// Read a browsed file from disk and select it
    pub async fn browse_file(&self, path: &Path) -> anyhow::Result<bool> {
        let file = SelectedFile::from_path(path).await?;
        Ok(self.select_file(file))
    }

    pub fn drop_files(&self, files: Vec<SelectedFile>) -> bool {
        self.state().upload.accept_dropped(files)
    }

    pub fn drag_enter(&self) {
        self.state().upload.drag_enter();
    }

    pub fn drag_leave(&self) {
        self.state().upload.drag_leave();
    }

    // ------------------------------------------------------------------
    // Exam form
    // ------------------------------------------------------------------

    pub fn set_clinical_indication(&self, text: impl Into<String>) {
        self.state().form.clinical_indication = text.into();
    }

    /// Exam date as `YYYY-MM-DD`
    pub fn set_exam_date(&self, date: impl Into<String>) {
        self.state().form.exam_date = date.into();
    }

    pub fn set_patient_name(&self, name: impl Into<String>) {
        self.state().form.patient_name = name.into();
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    /// Upload the pending file and show the results.
    ///
    /// Returns false without sending anything when no file is selected or an
    /// analysis is already running.
    pub async fn analyze(&self) -> bool {
        let begun = self.state().begin_analysis(&self.config.default_patient_name);
        let Some((token, upload)) = begun else {
            return false;
        };
        let _loading = LoadingGuard { state: &self.state };

        match self.backend.upload_and_analyze(upload).await {
            Ok(result) => {
                let mut state = self.state();
                if state.apply_analysis(token, &result) {
                    self.report
                        .start(result.medical_report, self.config.report_reveal_interval());
                }
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                self.state().fail_analysis(token, format!("Error: {}", e));
            }
        }
        true
    }

    pub fn dismiss_alert(&self) -> Option<String> {
        self.state().dismiss_alert()
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub fn set_question(&self, text: impl Into<String>) {
        self.state().chat.set_input(text);
    }

    /// Send the question input about the current image.
    ///
    /// Returns false without sending anything when the question is blank, no
    /// image is loaded, or a question is already in flight.
    pub async fn ask(&self) -> bool {
        let begun = self.state().begin_question();
        let Some(pending) = begun else {
            return false;
        };
        let _asking = AskingGuard { state: &self.state };

        let reply = match self
            .backend
            .ask_question(&pending.question, &pending.image_path)
            .await
        {
            Ok(answer) => answer.answer,
            // The service's own message is shown as the answer
            Err(ApiError::Server(message)) => message,
            Err(e) => {
                warn!("Question failed: {}", e);
                format!("Error: {}", e)
            }
        };

        self.state().apply_reply(pending.token, reply);
        true
    }

    // ------------------------------------------------------------------
    // Tabs and history
    // ------------------------------------------------------------------

    /// Switch tabs; opening History loads the unfiltered report list
    pub async fn switch_tab(&self, tab: Tab) {
        self.state().set_active_tab(tab);
        if tab == Tab::History {
            self.search_history("").await;
        }
    }

    /// Fetch reports matching `query`; called on every search keystroke
    pub async fn search_history(&self, query: &str) {
        let token = self.state().history.begin_search(query);
        let reply = self.backend.history(query).await;

        let mut state = self.state();
        match reply {
            Ok(entries) => {
                if state.history.apply(token, entries) {
                    debug!("History shows {} reports", state.history.entries().len());
                }
            }
            Err(e) => {
                state.history.fail(token, &e);
            }
        }
    }

    /// Load the listed report at `index` into the main view
    pub fn recall(&self, index: usize) -> bool {
        let entry = self.state().history.entry(index).cloned();
        match entry {
            Some(entry) => self.recall_entry(&entry),
            None => {
                debug!("Recall ignored: no history entry at {}", index);
                false
            }
        }
    }

    /// Load a stored report into the main view without re-analysis
    pub fn recall_entry(&self, entry: &HistoryEntry) -> bool {
        let mut state = self.state();
        let findings = match Findings::from_json_str(&entry.findings) {
            Ok(findings) => findings,
            Err(e) => {
                state.raise_alert(format!("Error: {}", e));
                return false;
            }
        };

        state.apply_recalled(entry, findings);
        info!("Recalled report {:?}", entry.id);
        // Started under the state lock so reveals follow the order results were applied
        self.report
            .start(entry.report_text.clone(), self.config.history_reveal_interval());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AnalysisResult, AnalysisUpload, QuestionAnswer};
    use crate::chat::ChatRole;
    use crate::findings::Finding;
    use crate::render::HistoryPanel;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted backend that records every call
    #[derive(Default)]
    struct FakeBackend {
        analyses: Mutex<VecDeque<Result<AnalysisResult, ApiError>>>,
        answers: Mutex<VecDeque<Result<QuestionAnswer, ApiError>>>,
        reports: Mutex<Vec<HistoryEntry>>,
        uploads: Mutex<Vec<AnalysisUpload>>,
        questions: Mutex<Vec<(String, String)>>,
        queries: Mutex<Vec<String>>,
        analysis_gate: Option<Arc<Notify>>,
        question_gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                analysis_gate: Some(gate),
                ..Self::default()
            }
        }

        fn with_question_gate(gate: Arc<Notify>) -> Self {
            Self {
                question_gate: Some(gate),
                ..Self::default()
            }
        }

        fn push_analysis(&self, reply: Result<AnalysisResult, ApiError>) {
            self.analyses.lock().unwrap().push_back(reply);
        }

        fn push_answer(&self, reply: Result<QuestionAnswer, ApiError>) {
            self.answers.lock().unwrap().push_back(reply);
        }

        fn upload_count(&self) -> usize {
            self.uploads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReportBackend for FakeBackend {
        async fn upload_and_analyze(&self, upload: AnalysisUpload) -> Result<AnalysisResult, ApiError> {
            self.uploads.lock().unwrap().push(upload);
            if let Some(gate) = &self.analysis_gate {
                gate.notified().await;
            }
            self.analyses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Parse("no scripted analysis".to_string())))
        }

        async fn ask_question(&self, question: &str, image_path: &str) -> Result<QuestionAnswer, ApiError> {
            self.questions
                .lock()
                .unwrap()
                .push((question.to_string(), image_path.to_string()));
            if let Some(gate) = &self.question_gate {
                gate.notified().await;
            }
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Parse("no scripted answer".to_string())))
        }

        async fn history(&self, query: &str) -> Result<Vec<HistoryEntry>, ApiError> {
            self.queries.lock().unwrap().push(query.to_string());
            let needle = query.to_lowercase();
            Ok(self
                .reports
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.patient_name.to_lowercase().contains(&needle) || r.exam_date.contains(&needle))
                .cloned()
                .collect())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 27).unwrap()
    }

    fn workspace(backend: &Arc<FakeBackend>) -> Workspace {
        let backend: Arc<dyn ReportBackend> = backend.clone();
        Workspace::with_date(backend, Config::default(), today())
    }

    fn chest_png() -> SelectedFile {
        SelectedFile::new("chest.png", "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn analysis(path: &str, report: &str) -> AnalysisResult {
        AnalysisResult {
            image_path: path.to_string(),
            cv_findings: Findings::new(vec![
                Finding::new("Pneumonia", 0.82),
                Finding::new("Effusion", 0.91),
            ]),
            medical_report: report.to_string(),
            analysis_date: Some("2025-11-27".to_string()),
            clinical_indication: None,
            status: Some("success".to_string()),
        }
    }

    fn stored(name: &str, path: &str, findings: &str) -> HistoryEntry {
        HistoryEntry {
            id: Some(3),
            patient_name: name.to_string(),
            exam_date: "2025-11-20".to_string(),
            upload_date: None,
            image_path: path.to_string(),
            clinical_indication: Some("Cough".to_string()),
            report_text: "Stored report.".to_string(),
            findings: findings.to_string(),
        }
    }

    #[tokio::test]
    async fn test_analyze_without_file_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let ws = workspace(&backend);

        assert!(!ws.analyze().await);
        assert_eq!(backend.upload_count(), 0);
        assert!(!ws.view().upload.analyze_enabled);
    }

    #[tokio::test]
    async fn test_non_image_selection_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        let ws = workspace(&backend);

        assert!(!ws.select_file(SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec())));
        assert!(ws.view().upload.file_name.is_none());

        ws.drag_enter();
        assert!(ws.view().upload.drop_zone_hover);
        assert!(ws.drop_files(vec![chest_png()]));
        let view = ws.view();
        assert!(!view.upload.drop_zone_hover);
        assert_eq!(view.upload.file_name.as_deref(), Some("chest.png"));
        assert!(view.upload.preview.unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_shows_sorted_findings_and_report() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Ok(analysis("uploads/chest.png", "No acute findings.")));
        let ws = workspace(&backend);
        ws.select_file(chest_png());
        ws.set_clinical_indication("Fever and cough");

        assert!(ws.analyze().await);
        ws.report_reveal().wait_complete().await;

        let upload = backend.uploads.lock().unwrap()[0].clone();
        assert_eq!(upload.patient_name, "Anonymous");
        assert_eq!(upload.date, "2025-11-27");
        assert_eq!(upload.clinical_indication, "Fever and cough");
        assert_eq!(upload.file.name(), "chest.png");

        let view = ws.view();
        assert!(!view.loading_overlay);
        assert!(!view.scanning);
        let results = view.results.unwrap();
        assert_eq!(results.image_path, "uploads/chest.png");
        assert_eq!(results.findings[0].name, "Effusion");
        assert_eq!(results.findings[0].label, "91.0%");
        assert_eq!(results.findings[1].name, "Pneumonia");
        assert_eq!(results.report_text, "No acute findings.");
        assert!(results.report_complete);
        assert_eq!(results.report_date, "November 27, 2025");
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_reveals_progressively() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Ok(analysis("uploads/chest.png", "abcdef")));
        let ws = workspace(&backend);
        ws.select_file(chest_png());

        ws.analyze().await;
        // First character is shown at once
        tokio::task::yield_now().await;
        assert_eq!(ws.report_reveal().visible_text(), "a");

        tokio::time::sleep(Duration::from_millis(25)).await;
        let partial = ws.report_reveal().visible_text();
        assert!(partial.len() > 1 && partial.len() < 6, "got {:?}", partial);

        ws.report_reveal().wait_complete().await;
        assert_eq!(ws.report_reveal().visible_text(), "abcdef");
    }

    #[tokio::test]
    async fn test_failed_analysis_alerts_and_clears_loading() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Err(ApiError::Server("Invalid image format".to_string())));
        let ws = workspace(&backend);
        ws.select_file(chest_png());

        assert!(ws.analyze().await);

        let view = ws.view();
        assert!(!view.loading_overlay);
        assert!(view.results.is_none());
        assert!(view.upload.analyze_enabled);
        assert_eq!(view.alert.as_deref(), Some("Error: Invalid image format"));
        assert_eq!(ws.dismiss_alert().as_deref(), Some("Error: Invalid image format"));
        assert!(ws.view().alert.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reanalysis_keeps_previous_results() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Ok(analysis("uploads/first.png", "First.")));
        backend.push_analysis(Err(ApiError::Parse("unexpected EOF".to_string())));
        let ws = workspace(&backend);
        ws.select_file(chest_png());

        ws.analyze().await;
        ws.analyze().await;

        let view = ws.view();
        assert_eq!(view.results.unwrap().image_path, "uploads/first.png");
        assert_eq!(
            view.alert.as_deref(),
            Some("Error: Failed to parse response: unexpected EOF")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_analysis_clears_loading() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(gate));
        let ws = workspace(&backend);
        ws.select_file(chest_png());

        let outcome = tokio::time::timeout(Duration::from_secs(1), ws.analyze()).await;
        assert!(outcome.is_err());
        assert_eq!(backend.upload_count(), 1);

        let view = ws.view();
        assert!(!view.loading_overlay);
        assert!(view.upload.analyze_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_appends_question_and_answer() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Ok(analysis("uploads/chest.png", "Report.")));
        backend.push_answer(Ok(QuestionAnswer {
            answer: "No effusion is seen.".to_string(),
            question: None,
        }));
        let ws = workspace(&backend);
        ws.select_file(chest_png());
        ws.analyze().await;

        ws.set_question("  Is there an effusion? ");
        assert!(ws.view().chat.ask_enabled);
        assert!(ws.ask().await);

        assert_eq!(
            backend.questions.lock().unwrap()[0],
            ("Is there an effusion?".to_string(), "uploads/chest.png".to_string())
        );
        let chat = ws.view().chat;
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, ChatRole::User);
        assert_eq!(chat.messages[0].text, "Is there an effusion?");
        assert_eq!(chat.messages[1].role, ChatRole::Ai);
        assert_eq!(chat.messages[1].text, "No effusion is seen.");
        assert_eq!(chat.question_input, "");
        assert!(!chat.ask_enabled);
    }

    #[tokio::test]
    async fn test_ask_without_image_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let ws = workspace(&backend);

        ws.set_question("Anything?");
        assert!(!ws.view().chat.ask_enabled);
        assert!(!ws.ask().await);
        assert!(backend.questions.lock().unwrap().is_empty());
        assert!(ws.view().chat.messages.is_empty());
    }

    #[tokio::test]
    async fn test_ask_errors_become_ai_messages() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_answer(Err(ApiError::Server("no image context".to_string())));
        backend.push_answer(Err(ApiError::Http {
            status: 502,
            body: "Bad Gateway".to_string(),
        }));
        let ws = workspace(&backend);
        ws.recall_entry(&stored("John", "uploads/old.png", "{}"));

        ws.set_question("First?");
        ws.ask().await;
        ws.set_question("Second?");
        ws.ask().await;

        let chat = ws.view().chat;
        assert_eq!(chat.messages.len(), 4);
        assert_eq!(chat.messages[1].role, ChatRole::Ai);
        assert_eq!(chat.messages[1].text, "no image context");
        assert_eq!(chat.messages[3].text, "Error: HTTP 502: Bad Gateway");
    }

    #[tokio::test]
    async fn test_history_tab_loads_unfiltered_list() {
        let backend = Arc::new(FakeBackend::default());
        backend
            .reports
            .lock()
            .unwrap()
            .push(stored("Jane Roe", "uploads/jane.png", "{}"));
        let ws = workspace(&backend);

        ws.switch_tab(Tab::History).await;

        assert_eq!(backend.queries.lock().unwrap().as_slice(), &["".to_string()]);
        let view = ws.view();
        assert_eq!(view.active_tab, Tab::History);
        match view.history.panel {
            HistoryPanel::Reports(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].patient_name, "Jane Roe");
                assert_eq!(rows[0].exam_date, "2025-11-20");
            }
            other => panic!("expected reports, got {:?}", other),
        }

        ws.switch_tab(Tab::NewReport).await;
        assert_eq!(backend.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_without_matches() {
        let backend = Arc::new(FakeBackend::default());
        backend
            .reports
            .lock()
            .unwrap()
            .push(stored("Jane Roe", "uploads/jane.png", "{}"));
        let ws = workspace(&backend);

        ws.search_history("john").await;

        let history = ws.view().history;
        assert_eq!(history.query, "john");
        assert_eq!(history.panel, HistoryPanel::Empty);
        assert_eq!(history.panel.message(), Some("No reports found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recall_shows_stored_report_without_analysis() {
        let backend = Arc::new(FakeBackend::default());
        backend.reports.lock().unwrap().push(stored(
            "John Doe",
            "uploads/john.png",
            r#"{"Nodule": {"probability": 0.3}, "Cardiomegaly": {"probability": 0.7, "confidence": "Medium"}}"#,
        ));
        let ws = workspace(&backend);
        ws.switch_tab(Tab::History).await;

        assert!(ws.recall(0));
        ws.report_reveal().wait_complete().await;

        assert_eq!(backend.upload_count(), 0);
        let view = ws.view();
        assert_eq!(view.active_tab, Tab::NewReport);
        let results = view.results.unwrap();
        assert_eq!(results.image_path, "uploads/john.png");
        assert_eq!(results.findings[0].name, "Cardiomegaly");
        assert_eq!(results.findings[1].name, "Nodule");
        assert_eq!(results.report_text, "Stored report.");
        assert!(view.chat.messages.is_empty());
    }

    #[tokio::test]
    async fn test_recall_out_of_range_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        let ws = workspace(&backend);

        assert!(!ws.recall(4));
        assert!(ws.view().results.is_none());
    }

    #[tokio::test]
    async fn test_recall_malformed_findings_alerts() {
        let backend = Arc::new(FakeBackend::default());
        let ws = workspace(&backend);
        ws.set_exam_date("2025-11-01");

        assert!(!ws.recall_entry(&stored("John", "uploads/bad.png", "not json")));

        let view = ws.view();
        assert!(view.results.is_none());
        assert_eq!(view.active_tab, Tab::NewReport);
        assert!(view
            .alert
            .unwrap()
            .starts_with("Error: Stored findings are not valid JSON"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recall_supersedes_analysis_in_flight() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(gate.clone()));
        backend.push_analysis(Ok(analysis("uploads/new.png", "New report.")));
        let ws = workspace(&backend);
        ws.select_file(chest_png());

        let (analyzed, _) = tokio::join!(ws.analyze(), async {
            ws.recall_entry(&stored("John", "uploads/old.png", "{}"));
            gate.notify_one();
        });
        assert!(analyzed);
        ws.report_reveal().wait_complete().await;

        let view = ws.view();
        assert!(!view.loading_overlay);
        let results = view.results.unwrap();
        assert_eq!(results.image_path, "uploads/old.png");
        assert_eq!(results.report_text, "Stored report.");
    }

    #[tokio::test]
    async fn test_patient_name_is_sent_when_given() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_analysis(Err(ApiError::Server("busy".to_string())));
        let ws = workspace(&backend);
        ws.select_file(chest_png());
        ws.set_patient_name("Jane Roe");
        ws.set_exam_date("2025-11-01");

        ws.analyze().await;

        let upload = backend.uploads.lock().unwrap()[0].clone();
        assert_eq!(upload.patient_name, "Jane Roe");
        assert_eq!(upload.date, "2025-11-01");
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_reply_kept_when_analysis_started_meanwhile_fails() {
        let question_gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::with_question_gate(question_gate.clone()));
        backend.push_analysis(Err(ApiError::Server("Invalid image format".to_string())));
        backend.push_answer(Ok(QuestionAnswer {
            answer: "Answer about A".to_string(),
            question: None,
        }));
        let ws = Arc::new(workspace(&backend));
        ws.recall_entry(&stored("John", "uploads/A.png", "{}"));
        ws.select_file(chest_png());

        ws.set_question("About A?");
        let asking = tokio::spawn({
            let ws = ws.clone();
            async move { ws.ask().await }
        });
        wait_until(|| backend.questions.lock().unwrap().len() == 1).await;

        assert!(ws.analyze().await);
        question_gate.notify_one();
        assert!(asking.await.unwrap());

        let view = ws.view();
        assert_eq!(view.results.unwrap().image_path, "uploads/A.png");
        assert_eq!(view.alert.as_deref(), Some("Error: Invalid image format"));
        assert_eq!(view.chat.messages.len(), 2);
        assert_eq!(view.chat.messages[1].role, ChatRole::Ai);
        assert_eq!(view.chat.messages[1].text, "Answer about A");
    }

    #[tokio::test]
    async fn test_reply_about_replaced_image_is_dropped() {
        let analysis_gate = Arc::new(Notify::new());
        let question_gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            analysis_gate: Some(analysis_gate.clone()),
            question_gate: Some(question_gate.clone()),
            ..FakeBackend::default()
        });
        backend.push_analysis(Ok(analysis("uploads/B.png", "Report for B.")));
        backend.push_answer(Ok(QuestionAnswer {
            answer: "Answer about A".to_string(),
            question: None,
        }));
        let ws = Arc::new(workspace(&backend));
        ws.recall_entry(&stored("John", "uploads/A.png", "{}"));
        ws.select_file(chest_png());

        let analyzing = tokio::spawn({
            let ws = ws.clone();
            async move { ws.analyze().await }
        });
        wait_until(|| backend.upload_count() == 1).await;

        ws.set_question("About A?");
        let asking = tokio::spawn({
            let ws = ws.clone();
            async move { ws.ask().await }
        });
        wait_until(|| backend.questions.lock().unwrap().len() == 1).await;
        assert_eq!(backend.questions.lock().unwrap()[0].1, "uploads/A.png");

        analysis_gate.notify_one();
        assert!(analyzing.await.unwrap());
        question_gate.notify_one();
        assert!(asking.await.unwrap());

        let view = ws.view();
        assert_eq!(view.results.unwrap().image_path, "uploads/B.png");
        assert!(view.chat.messages.is_empty());
        assert!(view.chat.question_input.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_analysis_failure_raises_no_alert() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(gate.clone()));
        backend.push_analysis(Err(ApiError::Server("Invalid image format".to_string())));
        let ws = Arc::new(workspace(&backend));
        ws.select_file(chest_png());

        let analyzing = tokio::spawn({
            let ws = ws.clone();
            async move { ws.analyze().await }
        });
        wait_until(|| backend.upload_count() == 1).await;

        assert!(ws.recall_entry(&stored("John", "uploads/old.png", "{}")));
        gate.notify_one();
        assert!(analyzing.await.unwrap());

        let view = ws.view();
        assert!(view.alert.is_none());
        assert!(!view.loading_overlay);
        assert_eq!(view.results.unwrap().image_path, "uploads/old.png");
    }
}
