//! Pipeline stage machine and streamed-event application.

use crate::cells::{CellOutput, CellStore};
use crate::transcript::{apply_guard_event, ChatMessage, Transcript};
use lab_client::protocol::{AgentEvent, ModelSuggestion};
use serde::{Deserialize, Serialize};

/// Where the AutoML conversation currently stands.
///
/// `Analyzing` and `BuildingPipeline` are transient in-flight states; a
/// failed stream reverts to the stage active before the call. The
/// queryable milestones (Idle, Analyzed, PipelineBuilt) only move
/// forward until a full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Analyzing,
    Analyzed,
    BuildingPipeline,
    PipelineBuilt,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Analyzed => "analyzed",
            PipelineStage::BuildingPipeline => "building pipeline",
            PipelineStage::PipelineBuilt => "pipeline built",
        };
        write!(f, "{name}")
    }
}

/// What a completed stream reported back.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    /// A terminal `done` event arrived.
    pub done: bool,
    /// Feature columns returned by pipeline building, used to seed the
    /// prediction form.
    pub feature_columns: Vec<String>,
    /// Latest ranked model list seen in this stream.
    pub models: Option<Vec<ModelSuggestion>>,
    /// The agent reported an error event (terminal or not).
    pub saw_error: bool,
}

/// Apply one streamed event to the stores.
///
/// Each event causes at most one cell append or one transcript append
/// (feature engineering causes one of each); guard events go through
/// the shared guard rendering. Unknown kinds are ignored.
pub fn apply_stream_event(
    cells: &mut CellStore,
    transcript: &mut Transcript,
    event: AgentEvent,
    outcome: &mut StreamOutcome,
) {
    if apply_guard_event(transcript, &event) {
        return;
    }
    match event {
        AgentEvent::Status { message } => {
            transcript.push(ChatMessage::Status { text: message });
        }
        AgentEvent::CodeCell {
            code,
            stdout,
            error,
            charts,
        } => {
            cells.append_executed(
                &code,
                CellOutput {
                    stdout,
                    error,
                    charts,
                    duration_ms: None,
                },
            );
        }
        AgentEvent::Analysis { report } => {
            transcript.push(ChatMessage::Analysis { report });
        }
        AgentEvent::FeatureEngineering {
            code,
            stdout,
            error,
            summary,
        } => {
            cells.append_executed(
                &code,
                CellOutput {
                    stdout,
                    error,
                    charts: Vec::new(),
                    duration_ms: None,
                },
            );
            transcript.push(ChatMessage::FeatureEngineering { summary });
        }
        AgentEvent::ModelSuggestions { models } => {
            outcome.models = Some(models.clone());
            transcript.push(ChatMessage::ModelSuggestions { models });
        }
        AgentEvent::Reasoning { text } => {
            transcript.push(ChatMessage::Reasoning { text });
        }
        AgentEvent::Done { feature_columns } => {
            outcome.done = true;
            outcome.feature_columns = feature_columns;
        }
        AgentEvent::Error { message } => {
            outcome.saw_error = true;
            transcript.push(ChatMessage::Error { text: message });
        }
        AgentEvent::Unknown => {}
        // Guard variants were consumed by apply_guard_event above.
        AgentEvent::GuardAnalyzing { .. }
        | AgentEvent::WebSearching { .. }
        | AgentEvent::FixAttempt { .. }
        | AgentEvent::FixSuccess { .. }
        | AgentEvent::GiveUp { .. } => {}
    }
}
