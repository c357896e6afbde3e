//! Wire types for the analysis service.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::findings::Findings;
use crate::upload::SelectedFile;

/// Multipart upload for `POST /upload_and_analyze`
#[derive(Debug, Clone)]
pub struct AnalysisUpload {
    pub file: SelectedFile,
    pub clinical_indication: String,
    /// Exam date as `YYYY-MM-DD`
    pub date: String,
    pub patient_name: String,
}

/// Successful analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_path: String,
    pub cv_findings: Findings,
    pub medical_report: String,
    #[serde(default)]
    pub analysis_date: Option<String>,
    #[serde(default)]
    pub clinical_indication: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// JSON body for `POST /question`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionAnswer {
    pub answer: String,
    /// Echo of the question, when the service includes it
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub reports: Vec<HistoryEntry>,
}

/// One stored report as listed by `GET /history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exam_date: String,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_path: String,
    #[serde(default)]
    pub clinical_indication: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub report_text: String,
    /// Findings as a JSON-encoded string
    #[serde(default, deserialize_with = "null_as_empty")]
    pub findings: String,
}

/// JSON body for `POST /analyze` (image already on the server)
#[derive(Debug, Clone, Serialize)]
pub struct PathAnalysisRequest {
    pub image_path: String,
    pub clinical_indication: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FindingsRequest<'a> {
    pub image_path: &'a str,
}

/// Response of `POST /findings`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredFindings {
    pub image_path: String,
    pub findings: Findings,
}

/// Response of `GET /api`
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceInfo {
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
