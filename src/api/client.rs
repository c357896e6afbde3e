use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use super::types::{FindingsRequest, HistoryResponse};
use super::{
    decode_reply, AnalysisResult, AnalysisUpload, ApiError, HistoryEntry, PathAnalysisRequest,
    QuestionAnswer, QuestionRequest, ReportBackend, ServiceInfo, StructuredFindings,
};
use crate::config::Config;

/// HTTP client for the analysis service
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the configured server URL
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let cleaned_url = config.server_url.trim_end_matches('/');

        let parsed = reqwest::Url::parse(cleaned_url)
            .map_err(|e| ApiError::InvalidUrl(format!("'{}': {}", cleaned_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "must use http or https scheme, got: {}",
                parsed.scheme()
            )));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(ApiError::InvalidUrl(
                "must not contain credentials".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        info!("ApiClient created for {}", cleaned_url);

        Ok(Self {
            client,
            base_url: cleaned_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_reply<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        debug!("Response status {} ({} bytes)", status, body.len());
        decode_reply(status, &body)
    }

    /// `GET /api`
    pub async fn service_info(&self) -> Result<ServiceInfo, ApiError> {
        let response = self.client.get(self.endpoint("/api")).send().await?;
        Self::read_reply(response).await
    }

    /// `POST /analyze` for an image already stored on the server
    pub async fn analyze_image_path(
        &self,
        request: &PathAnalysisRequest,
    ) -> Result<AnalysisResult, ApiError> {
        info!("Requesting analysis of stored image {}", request.image_path);
        let response = self
            .client
            .post(self.endpoint("/analyze"))
            .json(request)
            .send()
            .await?;
        Self::read_reply(response).await
    }

    /// `POST /findings`
    pub async fn structured_findings(&self, image_path: &str) -> Result<StructuredFindings, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/findings"))
            .json(&FindingsRequest { image_path })
            .send()
            .await?;
        Self::read_reply(response).await
    }
}

#[async_trait]
impl ReportBackend for ApiClient {
    async fn upload_and_analyze(&self, upload: AnalysisUpload) -> Result<AnalysisResult, ApiError> {
        let url = self.endpoint("/upload_and_analyze");
        info!(
            "Uploading {} ({} bytes, {}) for analysis",
            upload.file.name(),
            upload.file.len(),
            upload.file.media_type()
        );

        let file_part = reqwest::multipart::Part::bytes(upload.file.bytes().to_vec())
            .file_name(upload.file.name().to_string())
            .mime_str(upload.file.media_type())
            .map_err(|e| ApiError::Request(format!("Failed to create file part: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("clinical_indication", upload.clinical_indication)
            .text("date", upload.date)
            .text("patient_name", upload.patient_name);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Analysis upload failed: {}", e);
                ApiError::Network(e)
            })?;

        let result: AnalysisResult = Self::read_reply(response).await?;
        info!(
            "Analysis complete: {} findings, {} char report",
            result.cv_findings.len(),
            result.medical_report.len()
        );
        Ok(result)
    }

    async fn ask_question(
        &self,
        question: &str,
        image_path: &str,
    ) -> Result<QuestionAnswer, ApiError> {
        debug!("Asking question ({} chars) about {}", question.len(), image_path);
        let request = QuestionRequest {
            question: question.to_string(),
            image_path: image_path.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint("/question"))
            .json(&request)
            .send()
            .await?;
        Self::read_reply(response).await
    }

    async fn history(&self, query: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self
            .client
            .get(self.endpoint("/history"))
            .query(&[("q", query)])
            .send()
            .await?;

        let history: HistoryResponse = Self::read_reply(response).await?;
        debug!("History query returned {} reports", history.reports.len());
        Ok(history.reports)
    }
}
