use lens_core::{SubmissionOutcome, SubmittedFile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("orchestrator returned {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationRequest {
    pub task: String,
    pub max_retries: u32,
}

/// Response of `POST /orchestrate`. Newer orchestrators return a
/// multi-file `files` map; older ones only the single `code`/`file_path`
/// pair. Both shapes are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationResponse {
    pub success: bool,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub execution_output: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub history: Vec<Value>,
}

impl OrchestrationResponse {
    /// Unifies both response shapes into what the reducer-side state
    /// knows how to ingest.
    pub fn outcome(&self) -> SubmissionOutcome {
        let mut files: Vec<SubmittedFile> = self
            .files
            .iter()
            .map(|(path, content)| SubmittedFile {
                path: path.clone(),
                content: content.clone(),
            })
            .collect();
        if files.is_empty() && !self.file_path.trim().is_empty() && !self.code.is_empty() {
            files.push(SubmittedFile {
                path: self.file_path.clone(),
                content: self.code.clone(),
            });
        }
        SubmissionOutcome {
            files,
            execution_output: if self.execution_output.is_empty() {
                None
            } else {
                Some(self.execution_output.clone())
            },
            preview_url: self.preview_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub version: String,
}

/// Thin REST client for the orchestrator's task-submission surface.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    base: Url,
    client: reqwest::Client,
}

impl OrchestratorClient {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    /// Submits a coding task and waits for the pipeline to finish.
    /// Callers must reset derived state (event buffer included) before
    /// calling, and ingest the outcome afterwards.
    pub async fn submit(&self, request: &OrchestrationRequest) -> Result<OrchestrationResponse, ApiError> {
        let url = self.base.join("/orchestrate")?;
        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let url = self.base.join("/health")?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_file_response_maps_every_file() {
        let response: OrchestrationResponse = serde_json::from_str(
            r#"{
                "success": true,
                "task": "make a site",
                "files": {"index.html": "<html></html>", "style.css": "body {}"},
                "preview_url": "http://localhost:8080/",
                "execution_output": "served"
            }"#,
        )
        .expect("parse");
        let outcome = response.outcome();
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.preview_url.as_deref(), Some("http://localhost:8080/"));
        assert_eq!(outcome.execution_output.as_deref(), Some("served"));
    }

    #[test]
    fn legacy_single_file_response_still_maps() {
        let response: OrchestrationResponse = serde_json::from_str(
            r#"{
                "success": true,
                "task": "fizzbuzz",
                "code": "print(1)",
                "file_path": "main.py",
                "execution_output": "1",
                "retries": 0,
                "history": []
            }"#,
        )
        .expect("parse");
        let outcome = response.outcome();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].path, "main.py");
        assert_eq!(outcome.files[0].content, "print(1)");
        assert!(outcome.preview_url.is_none());
    }

    #[test]
    fn empty_failure_response_yields_no_files() {
        let response: OrchestrationResponse = serde_json::from_str(
            r#"{"success": false, "execution_output": "Orchestration error: boom"}"#,
        )
        .expect("parse");
        let outcome = response.outcome();
        assert!(outcome.files.is_empty());
        assert_eq!(
            outcome.execution_output.as_deref(),
            Some("Orchestration error: boom")
        );
    }
}
