//! Client for the agent service: analysis, pipeline building,
//! prediction, and the conversational fallback.

use crate::error::{check_status, ClientError};
use crate::protocol::{
    AnalyzeRequest, BuildPipelineRequest, ChatRequest, ChatResponse, PredictRequest,
    PredictResponse,
};
use crate::stream::EventStream;
use log::debug;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Typed client for the agent service.
#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open the dataset-analysis stream.
    pub async fn analyze_stream(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<EventStream, ClientError> {
        let response = self
            .http
            .post(format!("{}/analyze-stream", self.base_url))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(EventStream::new(response))
    }

    /// Open the pipeline-building stream for a selected model.
    pub async fn build_pipeline_stream(
        &self,
        request: &BuildPipelineRequest,
    ) -> Result<EventStream, ClientError> {
        let response = self
            .http
            .post(format!("{}/build-pipeline-stream", self.base_url))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(EventStream::new(response))
    }

    /// Run a prediction through the built pipeline (non-streaming).
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/predict", self.base_url))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("bad predict response: {e}")))
    }

    /// Send a free-text message (non-streaming).
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("bad chat response: {e}")))
    }

    /// Best-effort teardown of the agent-side session state.
    pub async fn close_session(&self, session_id: &str) {
        let result = self
            .http
            .delete(format!("{}/agent-session/{}", self.base_url, session_id))
            .send()
            .await;
        if let Err(e) = result {
            debug!("[agent] session teardown failed (ignored): {e}");
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
