//! Client for the execution service: sessions, cell execution, dataset
//! upload, and liveness.

use crate::error::{check_status, ClientError};
use crate::protocol::{CreateSessionResponse, ExecuteRequest, ExecuteResponse, UploadResponse};
use log::{debug, info};
use std::time::Duration;

/// Timeout for health probes. Health checks degrade to an offline
/// status rather than blocking callers.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Typed client for the execution service.
#[derive(Clone)]
pub struct ExecutionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExecutionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a new remote session.
    pub async fn create_session(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/session", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("bad session response: {e}")))?;
        info!("[execution] created session {}", body.session_id);
        Ok(body.session_id)
    }

    /// Run one cell's code in the remote session.
    pub async fn execute(
        &self,
        session_id: &str,
        cell_id: &str,
        code: &str,
    ) -> Result<ExecuteResponse, ClientError> {
        let request = ExecuteRequest {
            session_id: session_id.to_string(),
            cell_id: cell_id.to_string(),
            code: code.to_string(),
        };
        let response = self
            .http
            .post(format!("{}/execute", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("bad execute response: {e}")))
    }

    /// Upload a dataset file as a multipart form.
    pub async fn upload(
        &self,
        session_id: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<UploadResponse, ClientError> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("session_id", session_id.to_string())
            .part("file", part);
        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("bad upload response: {e}")))
    }

    /// Best-effort teardown of the remote session. Failures are logged
    /// and swallowed; teardown is advisory.
    pub async fn close_session(&self, session_id: &str) {
        let result = self
            .http
            .delete(format!("{}/session/{}", self.base_url, session_id))
            .send()
            .await;
        if let Err(e) = result {
            debug!("[execution] session teardown failed (ignored): {e}");
        }
    }

    /// Liveness probe with a short fixed timeout.
    pub async fn health(&self) -> bool {
        self.http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
