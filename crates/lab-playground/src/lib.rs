//! playground - Interactive notebook orchestrator for the Lab AutoML
//! backends.
//!
//! The playground manages a remote, stateful code-execution session, an
//! ordered list of executable cells, and a multi-stage AutoML agent
//! conversation (upload → analyze → select model → build pipeline →
//! predict) consumed over a streamed event protocol, including the
//! agent's automated error-repair ("guard") narration.
//!
//! All state mutation is serialized through `&mut self` methods; network
//! calls are async, and every continuation re-checks the session epoch
//! before applying effects so responses that outlive a reset are
//! dropped.

pub mod cells;
pub mod config;
pub mod error;
pub mod health;
pub mod history;
pub mod pipeline;
pub mod policy;
pub mod session;
pub mod transcript;

pub use cells::{Cell, CellOutput, CellStatus, CellStore};
pub use config::LabConfig;
pub use error::LabError;
pub use pipeline::PipelineStage;
pub use session::SessionManager;
pub use transcript::{ChatMessage, GuardStep, Transcript, TranscriptEntry};

use lab_client::protocol::{
    AnalyzeRequest, BuildPipelineRequest, ChatRequest, ExecuteResponse, ModelSuggestion,
    PredictRequest,
};
use lab_client::stream::EventStream;
use lab_client::{AgentClient, ClientError, ExecutionClient};
use log::{debug, info, warn};
use pipeline::{apply_stream_event, StreamOutcome};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use transcript::apply_guard_event;
use uuid::Uuid;

/// Reference to the uploaded dataset the pipeline operates on.
#[derive(Debug, Clone)]
pub struct DatasetRef {
    pub filename: String,
    pub file_path: String,
    pub size_kb: f64,
}

/// Outcome of a [`Playground::run_cell`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The cell ran (or failed remotely) and its result is on the cell.
    Completed,
    /// The safety policy rejected the code; no network call was made.
    Rejected,
    /// The target cell is already running, or another cell holds the
    /// single execution slot.
    Busy,
    /// The cell id does not exist.
    Missing,
    /// The execution backend is unavailable; nothing was run.
    Unavailable,
    /// A reset happened while the request was in flight; the result was
    /// dropped.
    Stale,
}

/// The interactive notebook orchestrator.
pub struct Playground {
    config: LabConfig,
    execution: ExecutionClient,
    agent: AgentClient,
    session: SessionManager,
    cells: CellStore,
    transcript: Transcript,
    stage: PipelineStage,
    dataset: Option<DatasetRef>,
    target_column: Option<String>,
    suggestions: Vec<ModelSuggestion>,
    feature_columns: Vec<String>,
}

impl Playground {
    pub fn new(config: LabConfig) -> Self {
        let execution = ExecutionClient::new(config.execution_url.clone());
        let agent = AgentClient::new(config.agent_url.clone());
        Self {
            config,
            execution,
            agent,
            session: SessionManager::new(),
            cells: CellStore::new(),
            transcript: Transcript::new(),
            stage: PipelineStage::Idle,
            dataset: None,
            target_column: None,
            suggestions: Vec::new(),
            feature_columns: Vec::new(),
        }
    }

    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn dataset(&self) -> Option<&DatasetRef> {
        self.dataset.as_ref()
    }

    pub fn suggestions(&self) -> &[ModelSuggestion] {
        &self.suggestions
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.id()
    }

    /// Persistent connection-error banner text, if any.
    pub fn connection_error(&self) -> Option<&str> {
        self.session.connection_error()
    }

    pub fn execution_client(&self) -> &ExecutionClient {
        &self.execution
    }

    pub fn agent_client(&self) -> &AgentClient {
        &self.agent
    }

    // ============================================================================
    // Cell editing
    // ============================================================================

    pub fn insert_cell_after(&mut self, after: Option<Uuid>) -> Uuid {
        self.cells.insert_after(after)
    }

    pub fn append_cell(&mut self) -> Uuid {
        self.cells.append_empty()
    }

    pub fn update_cell_code(&mut self, cell_id: Uuid, code: &str) -> bool {
        self.cells.update_code(cell_id, code)
    }

    pub fn delete_cell(&mut self, cell_id: Uuid) -> bool {
        self.cells.delete(cell_id)
    }

    pub fn move_cell_up(&mut self, cell_id: Uuid) -> bool {
        self.cells.move_up(cell_id)
    }

    pub fn move_cell_down(&mut self, cell_id: Uuid) -> bool {
        self.cells.move_down(cell_id)
    }

    pub fn set_cell_output_open(&mut self, cell_id: Uuid, open: bool) -> bool {
        self.cells.set_output_open(cell_id, open)
    }

    // ============================================================================
    // Cell execution
    // ============================================================================

    /// Execute one cell against the remote session.
    ///
    /// Re-running a cell that is already Running is a no-op, and while
    /// any cell runs the single remote execution slot is considered
    /// taken. The safety policy is checked before anything touches the
    /// network.
    pub async fn run_cell(&mut self, cell_id: Uuid) -> RunOutcome {
        let Some(cell) = self.cells.get(cell_id) else {
            return RunOutcome::Missing;
        };
        if cell.status == CellStatus::Running {
            return RunOutcome::Busy;
        }
        let code = cell.code.clone();

        if let Some(rule) = policy::check(&code) {
            info!("[playground] cell {cell_id} rejected by safety policy");
            self.cells.mark_rejected(cell_id, rule.message);
            return RunOutcome::Rejected;
        }

        let session_id = match self.session.ensure(&self.execution).await {
            Ok(id) => id,
            Err(e) => {
                warn!("[playground] cannot run cell: {e}");
                return RunOutcome::Unavailable;
            }
        };
        let epoch = self.session.epoch();

        if self.cells.begin_execution(cell_id).is_none() {
            // ensure() may have suspended; re-resolve slot and cell.
            return if self.cells.get(cell_id).is_some() {
                RunOutcome::Busy
            } else {
                RunOutcome::Missing
            };
        }

        let started = Instant::now();
        let result = self.execute_with_retry(&session_id, cell_id, &code).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if self.session.epoch() != epoch {
            debug!("[playground] dropping stale execution result for cell {cell_id}");
            return RunOutcome::Stale;
        }

        match result {
            Ok(response) => {
                self.cells
                    .finish_execution(cell_id, CellOutput::from_response(response, duration_ms));
            }
            Err(e) => {
                let mut output = CellOutput::error_text(e.to_string());
                output.duration_ms = Some(duration_ms);
                self.cells.finish_execution(cell_id, output);
            }
        }
        RunOutcome::Completed
    }

    /// POST the code, retrying transient failures a bounded number of
    /// times with a fixed delay between attempts.
    async fn execute_with_retry(
        &self,
        session_id: &str,
        cell_id: Uuid,
        code: &str,
    ) -> Result<ExecuteResponse, ClientError> {
        let attempts = self.config.execute_attempts.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut attempt = 1;
        loop {
            match self
                .execution
                .execute(session_id, &cell_id.to_string(), code)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!("[playground] execute attempt {attempt}/{attempts} failed, retrying: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ============================================================================
    // Pipeline stages
    // ============================================================================

    /// Upload a dataset and record its reference. Does not change the
    /// pipeline stage.
    pub async fn upload(&mut self, filename: &str, contents: Vec<u8>) -> Result<(), LabError> {
        let session_id = self.session.ensure(&self.execution).await?;
        let epoch = self.session.epoch();
        match self.execution.upload(&session_id, filename, contents).await {
            Ok(response) => {
                if self.session.epoch() != epoch {
                    return Ok(());
                }
                self.transcript.push(ChatMessage::Status {
                    text: format!(
                        "Uploaded {} ({:.1} KB). Ready to analyze.",
                        response.filename, response.size_kb
                    ),
                });
                self.dataset = Some(DatasetRef {
                    filename: response.filename,
                    file_path: response.file_path,
                    size_kb: response.size_kb,
                });
                Ok(())
            }
            Err(e) => {
                if self.session.epoch() == epoch {
                    self.transcript.push(ChatMessage::Error {
                        text: format!("Upload failed: {e}"),
                    });
                }
                Err(LabError::Connection(e.to_string()))
            }
        }
    }

    /// Run the dataset-analysis stage.
    ///
    /// Requires an uploaded dataset. On success the stage advances to
    /// Analyzed; on failure an error message is appended and the stage
    /// reverts so analysis can be retried.
    pub async fn analyze(&mut self, target_column: Option<&str>) -> Result<(), LabError> {
        let Some(dataset) = self.dataset.clone() else {
            let text = "Upload a dataset before running analysis.".to_string();
            self.transcript.push(ChatMessage::Error { text: text.clone() });
            return Err(LabError::InvalidStage(text));
        };
        match self.stage {
            PipelineStage::Idle | PipelineStage::Analyzed => {}
            stage => {
                return Err(LabError::InvalidStage(format!(
                    "Analysis is not available while the pipeline is {stage}."
                )));
            }
        }

        let session_id = self.session.ensure(&self.execution).await?;
        let epoch = self.session.epoch();
        let previous = self.stage;
        self.stage = PipelineStage::Analyzing;
        self.target_column = target_column.map(String::from);

        let request = AnalyzeRequest {
            session_id,
            file_path: dataset.file_path,
            filename: dataset.filename,
            target_column: self.target_column.clone(),
        };
        let stream = match self.agent.analyze_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                self.stage = previous;
                self.transcript.push(ChatMessage::Error {
                    text: format!("Analysis failed: {e}"),
                });
                return Err(LabError::Stream(e.to_string()));
            }
        };

        let (mut outcome, stream_error) = self.drain_stream(stream, epoch).await;
        if self.session.epoch() != epoch {
            return Ok(());
        }
        if let Some(models) = outcome.models.take() {
            self.suggestions = models;
        }
        if let Some(e) = stream_error {
            self.stage = previous;
            self.transcript.push(ChatMessage::Error {
                text: format!("Analysis failed: {e}"),
            });
            return Err(LabError::Stream(e.to_string()));
        }
        if !outcome.done {
            self.stage = previous;
            if !outcome.saw_error {
                self.transcript.push(ChatMessage::Error {
                    text: "Analysis stream ended unexpectedly.".to_string(),
                });
            }
            return Err(LabError::Stream("analysis did not complete".to_string()));
        }

        self.stage = PipelineStage::Analyzed;
        self.transcript.push(ChatMessage::Status {
            text: "Analysis complete. Select a model to build a pipeline.".to_string(),
        });
        info!("[playground] analysis complete");
        Ok(())
    }

    /// Choose one of the suggested models and build the training
    /// pipeline.
    ///
    /// Selection is terminal: once a pipeline is built, re-selection is
    /// rejected until a full reset.
    pub async fn select_model(&mut self, model_name: &str) -> Result<(), LabError> {
        match self.stage {
            PipelineStage::Analyzed => {}
            PipelineStage::PipelineBuilt => {
                return Err(LabError::InvalidStage(
                    "A pipeline is already built; reset the session to start over.".to_string(),
                ));
            }
            stage => {
                return Err(LabError::InvalidStage(format!(
                    "Model selection requires a completed analysis (stage is {stage})."
                )));
            }
        }
        if !self.suggestions.iter().any(|s| s.name == model_name) {
            return Err(LabError::InvalidStage(format!(
                "'{model_name}' is not in the current suggestion list."
            )));
        }

        let session_id = self.session.ensure(&self.execution).await?;
        let epoch = self.session.epoch();
        let previous = self.stage;
        self.stage = PipelineStage::BuildingPipeline;

        let request = BuildPipelineRequest {
            session_id,
            selected_model: model_name.to_string(),
            target_column: self.target_column.clone(),
        };
        let stream = match self.agent.build_pipeline_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                self.stage = previous;
                self.transcript.push(ChatMessage::Error {
                    text: format!("Pipeline build failed: {e}"),
                });
                return Err(LabError::Stream(e.to_string()));
            }
        };

        let (mut outcome, stream_error) = self.drain_stream(stream, epoch).await;
        if self.session.epoch() != epoch {
            return Ok(());
        }
        if let Some(models) = outcome.models.take() {
            self.suggestions = models;
        }
        if let Some(e) = stream_error {
            self.stage = previous;
            self.transcript.push(ChatMessage::Error {
                text: format!("Pipeline build failed: {e}"),
            });
            return Err(LabError::Stream(e.to_string()));
        }
        if !outcome.done {
            self.stage = previous;
            if !outcome.saw_error {
                self.transcript.push(ChatMessage::Error {
                    text: "Pipeline stream ended unexpectedly.".to_string(),
                });
            }
            return Err(LabError::Stream("pipeline build did not complete".to_string()));
        }

        // A done event is terminal even if error events occurred earlier
        // in the same stream.
        self.feature_columns = outcome.feature_columns;
        self.stage = PipelineStage::PipelineBuilt;
        self.transcript.push(ChatMessage::PredictionForm {
            columns: self.feature_columns.clone(),
        });
        info!(
            "[playground] pipeline built with {model_name} ({} feature columns)",
            self.feature_columns.len()
        );
        Ok(())
    }

    /// Pull events off a stream until it ends, applying each to the
    /// stores in arrival order. Stops at the terminal event, on a
    /// transport error, or when a reset invalidates the epoch.
    async fn drain_stream(
        &mut self,
        mut stream: EventStream,
        epoch: u64,
    ) -> (StreamOutcome, Option<ClientError>) {
        let mut outcome = StreamOutcome::default();
        loop {
            match stream.next_event().await {
                Ok(Some(event)) => {
                    if self.session.epoch() != epoch {
                        debug!("[playground] dropping stream events after reset");
                        return (StreamOutcome::default(), None);
                    }
                    apply_stream_event(&mut self.cells, &mut self.transcript, event, &mut outcome);
                    if outcome.done {
                        return (outcome, None);
                    }
                }
                Ok(None) => return (outcome, None),
                Err(e) => return (outcome, Some(e)),
            }
        }
    }

    // ============================================================================
    // Prediction
    // ============================================================================

    /// Run a prediction through the built pipeline.
    ///
    /// Feature columns without an input are sent as empty strings; the
    /// remote side owns validation.
    pub async fn predict(&mut self, inputs: &HashMap<String, String>) -> Result<(), LabError> {
        if self.stage != PipelineStage::PipelineBuilt {
            return Err(LabError::InvalidStage(
                "Prediction requires a built pipeline.".to_string(),
            ));
        }

        let session_id = self.session.ensure(&self.execution).await?;
        let epoch = self.session.epoch();

        let mut input_values = HashMap::new();
        for column in &self.feature_columns {
            input_values.insert(
                column.clone(),
                inputs.get(column).cloned().unwrap_or_default(),
            );
        }
        let request = PredictRequest {
            session_id,
            input_values,
        };

        match self.agent.predict(&request).await {
            Ok(response) => {
                if self.session.epoch() != epoch {
                    return Ok(());
                }
                let output = CellOutput {
                    stdout: response.output.clone(),
                    error: response.error.clone(),
                    charts: Vec::new(),
                    duration_ms: None,
                };
                self.cells.append_executed(&response.code, output);
                match response.error {
                    Some(error) => {
                        self.transcript.push(ChatMessage::Error {
                            text: format!("Prediction failed: {error}"),
                        });
                        Err(LabError::Execution(error))
                    }
                    None => {
                        self.transcript.push(ChatMessage::Status {
                            text: format!("Prediction result: {}", response.output.trim()),
                        });
                        Ok(())
                    }
                }
            }
            Err(e) => {
                if self.session.epoch() == epoch {
                    self.transcript.push(ChatMessage::Error {
                        text: format!("Prediction failed: {e}"),
                    });
                }
                Err(LabError::Connection(e.to_string()))
            }
        }
    }

    // ============================================================================
    // Conversational fallback
    // ============================================================================

    /// Free-text conversational fallback.
    ///
    /// Guard events bundled in the reply are replayed through the same
    /// rendering as the streaming path, and returned code is appended
    /// as a pre-executed cell. The textual reply is always appended.
    pub async fn ask(&mut self, text: &str) -> Result<(), LabError> {
        self.transcript.push(ChatMessage::User {
            text: text.to_string(),
        });

        let session_id = match self.session.ensure(&self.execution).await {
            Ok(id) => id,
            Err(e) => {
                self.transcript.push(ChatMessage::Error {
                    text: e.to_string(),
                });
                return Err(e);
            }
        };
        let epoch = self.session.epoch();

        let request = ChatRequest {
            session_id,
            message: text.to_string(),
        };
        match self.agent.chat(&request).await {
            Ok(response) => {
                if self.session.epoch() != epoch {
                    return Ok(());
                }
                for event in &response.guard_events {
                    apply_guard_event(&mut self.transcript, event);
                }
                if let Some(code) = &response.code {
                    let output = CellOutput {
                        stdout: response.output.clone().unwrap_or_default(),
                        error: response.error.clone(),
                        charts: Vec::new(),
                        duration_ms: None,
                    };
                    self.cells.append_executed(code, output);
                }
                if let Some(insight) = response.chart_insight {
                    self.transcript.push(ChatMessage::Reasoning { text: insight });
                }
                self.transcript.push(ChatMessage::Reply {
                    text: response.reply,
                });
                Ok(())
            }
            Err(e) => {
                if self.session.epoch() == epoch {
                    let text = if e.is_unreachable() {
                        "The agent endpoint is unreachable. Check that the agent service is running."
                            .to_string()
                    } else {
                        format!("Chat failed: {e}")
                    };
                    self.transcript.push(ChatMessage::Error { text });
                }
                Err(LabError::Connection(e.to_string()))
            }
        }
    }

    // ============================================================================
    // Reset and history
    // ============================================================================

    /// Full reset: tear down the remote session (best-effort), clear
    /// all local state, and invalidate in-flight responses.
    pub async fn reset(&mut self) {
        if let Some(id) = self.session.id() {
            history::clear(id);
        }
        self.session.reset(&self.execution, &self.agent).await;
        self.cells = CellStore::new();
        self.transcript = Transcript::new();
        self.stage = PipelineStage::Idle;
        self.dataset = None;
        self.target_column = None;
        self.suggestions.clear();
        self.feature_columns.clear();
        info!("[playground] reset complete");
    }

    /// Persist the transcript to the local history cache (best-effort,
    /// never authoritative).
    pub fn save_history(&self) {
        if let Some(id) = self.session.id() {
            if let Err(e) = history::save(id, self.transcript.entries()) {
                warn!("[playground] failed to save history: {e}");
            }
        }
    }
}
