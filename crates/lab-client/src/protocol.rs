//! Wire types for the execution and agent services.
//!
//! Streamed endpoints emit JSON events with a `type` tag. Unknown tags
//! decode to [`AgentEvent::Unknown`] so new server-side event kinds never
//! break older clients.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response to `POST /session`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Request body for `POST /execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub session_id: String,
    pub cell_id: String,
    pub code: String,
}

/// Result of executing one cell against the remote interpreter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Base64-encoded chart images produced during execution.
    #[serde(default)]
    pub charts: Vec<String>,
}

/// Response to a multipart dataset upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub file_path: String,
    #[serde(default)]
    pub size_kb: f64,
}

/// Request body for `POST /analyze-stream`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub session_id: String,
    pub file_path: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
}

/// Request body for `POST /build-pipeline-stream`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPipelineRequest {
    pub session_id: String,
    pub selected_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
}

/// Request body for `POST /predict`.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub session_id: String,
    pub input_values: HashMap<String, String>,
}

/// Response to `POST /predict`: prediction code that already ran
/// server-side, plus its output.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// Response to `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub chart_insight: Option<String>,
    /// Guard events that fired while the agent handled the message.
    #[serde(default)]
    pub guard_events: Vec<AgentEvent>,
}

/// A ranked model candidate returned by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSuggestion {
    pub rank: u32,
    /// Internal identifier sent back when the user selects this model.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub expected_performance: String,
}

/// Events emitted by the agent service's streaming endpoints.
///
/// The same vocabulary is used during analysis and pipeline building.
/// Guard events (`GuardAnalyzing` through `GiveUp`) narrate the agent's
/// automated error-repair loop; they only ever affect the transcript,
/// never the pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Free-text progress line.
    Status { message: String },
    /// Code that already ran server-side, with its captured output.
    CodeCell {
        code: String,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        charts: Vec<String>,
    },
    /// Structured dataset analysis report.
    Analysis { report: serde_json::Value },
    /// Feature-engineering step: code plus a human-readable summary.
    FeatureEngineering {
        code: String,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        summary: String,
    },
    /// Ranked model candidates; enables model selection.
    ModelSuggestions { models: Vec<ModelSuggestion> },
    /// Narrative reasoning from the agent.
    Reasoning { text: String },
    /// Guard: the agent noticed a failing step and is diagnosing it.
    GuardAnalyzing { step: String, error: String },
    /// Guard: the agent is searching the web for a fix.
    WebSearching { query: String },
    /// Guard: the agent proposes replacement code.
    FixAttempt { explanation: String, code: String },
    /// Guard: the replacement code ran cleanly.
    FixSuccess { explanation: String },
    /// Guard: retries exhausted, the step stays broken.
    GiveUp { step: String },
    /// Terminal success. Pipeline building also returns the feature
    /// columns needed for prediction.
    Done {
        #[serde(default)]
        feature_columns: Vec<String>,
    },
    /// Failure reported by the agent, terminal or mid-stream.
    Error { message: String },
    /// Any event kind this client does not understand.
    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    /// Whether this event belongs to the guard sub-protocol.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            AgentEvent::GuardAnalyzing { .. }
                | AgentEvent::WebSearching { .. }
                | AgentEvent::FixAttempt { .. }
                | AgentEvent::FixSuccess { .. }
                | AgentEvent::GiveUp { .. }
        )
    }
}
