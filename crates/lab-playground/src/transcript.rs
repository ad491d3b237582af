//! Append-only chat transcript.
//!
//! Messages are immutable once appended and ordered oldest first. Guard
//! messages from the agent's error-repair loop are rendered through one
//! shared function, [`apply_guard_event`], used by both the streaming
//! pipeline path and the non-streaming chat path.

use chrono::{DateTime, Utc};
use lab_client::protocol::{AgentEvent, ModelSuggestion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Presentation tag for a guard message (icon/color selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStep {
    Analyzing,
    WebSearching,
    FixAttempt,
    FixSuccess,
    GiveUp,
}

/// One transcript message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Status/info line.
    Status { text: String },
    /// Structured dataset analysis report.
    Analysis { report: serde_json::Value },
    /// Feature-engineering summary (the code itself lands in a cell).
    FeatureEngineering { summary: String },
    /// Ranked model candidates for the user to pick from.
    ModelSuggestions { models: Vec<ModelSuggestion> },
    /// Narrative reasoning from the agent.
    Reasoning { text: String },
    /// One step of the automated error-repair loop. The replacement
    /// code of a fix attempt is carried on the message but rendered
    /// collapsed.
    Guard {
        step: GuardStep,
        text: String,
        code: Option<String>,
    },
    /// Prediction input form seeded with the pipeline's feature columns.
    PredictionForm { columns: Vec<String> },
    /// Free-text message from the user.
    User { text: String },
    /// Free-text reply from the agent.
    Reply { text: String },
    /// Error surfaced to the user.
    Error { text: String },
}

/// A message plus its identity and arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub message: ChatMessage,
}

const WELCOME: &str = "Welcome to the Lab Playground. Upload a dataset to get started.";

/// Append-only log of chat messages, oldest first.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// A fresh transcript holds the single welcome message.
    pub fn new() -> Self {
        let mut transcript = Self {
            entries: Vec::new(),
        };
        transcript.push(ChatMessage::Status {
            text: WELCOME.to_string(),
        });
        transcript
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a message, returning its entry id.
    pub fn push(&mut self, message: ChatMessage) -> Uuid {
        let entry = TranscriptEntry {
            id: Uuid::new_v4(),
            at: Utc::now(),
            message,
        };
        let id = entry.id;
        self.entries.push(entry);
        id
    }
}

/// Append the transcript rendering of one guard event.
///
/// Returns false when the event is not part of the guard sub-protocol.
/// The guard sequence is informational: it never alters pipeline state,
/// but its order matters because steps reference each other narratively.
pub fn apply_guard_event(transcript: &mut Transcript, event: &AgentEvent) -> bool {
    let message = match event {
        AgentEvent::GuardAnalyzing { step, error } => ChatMessage::Guard {
            step: GuardStep::Analyzing,
            text: format!("{step} failed: {error}"),
            code: None,
        },
        AgentEvent::WebSearching { query } => ChatMessage::Guard {
            step: GuardStep::WebSearching,
            text: format!("Searching the web: {query}"),
            code: None,
        },
        AgentEvent::FixAttempt { explanation, code } => ChatMessage::Guard {
            step: GuardStep::FixAttempt,
            text: explanation.clone(),
            code: Some(code.clone()),
        },
        AgentEvent::FixSuccess { explanation } => ChatMessage::Guard {
            step: GuardStep::FixSuccess,
            text: explanation.clone(),
            code: None,
        },
        AgentEvent::GiveUp { step } => ChatMessage::Guard {
            step: GuardStep::GiveUp,
            text: format!("Could not repair step: {step}"),
            code: None,
        },
        _ => return false,
    };
    transcript.push(message);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transcript_has_welcome_message() {
        let transcript = Transcript::new();
        assert_eq!(transcript.len(), 1);
        assert!(matches!(
            &transcript.entries()[0].message,
            ChatMessage::Status { text } if text.contains("Welcome")
        ));
    }

    #[test]
    fn test_push_appends_in_order() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::User {
            text: "first".to_string(),
        });
        transcript.push(ChatMessage::Reply {
            text: "second".to_string(),
        });
        assert_eq!(transcript.len(), 3);
        assert!(matches!(
            &transcript.entries()[1].message,
            ChatMessage::User { text } if text == "first"
        ));
        assert!(matches!(
            &transcript.entries()[2].message,
            ChatMessage::Reply { text } if text == "second"
        ));
    }

    #[test]
    fn test_apply_guard_event_analyzing() {
        let mut transcript = Transcript::new();
        let applied = apply_guard_event(
            &mut transcript,
            &AgentEvent::GuardAnalyzing {
                step: "model_fit".to_string(),
                error: "ValueError: NaN".to_string(),
            },
        );
        assert!(applied);
        match &transcript.entries()[1].message {
            ChatMessage::Guard { step, text, code } => {
                assert_eq!(*step, GuardStep::Analyzing);
                assert!(text.contains("model_fit"));
                assert!(text.contains("ValueError"));
                assert!(code.is_none());
            }
            other => panic!("expected guard message, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_guard_event_fix_attempt_carries_code() {
        let mut transcript = Transcript::new();
        apply_guard_event(
            &mut transcript,
            &AgentEvent::FixAttempt {
                explanation: "Impute missing values".to_string(),
                code: "df.fillna(0)".to_string(),
            },
        );
        match &transcript.entries()[1].message {
            ChatMessage::Guard { step, code, .. } => {
                assert_eq!(*step, GuardStep::FixAttempt);
                assert_eq!(code.as_deref(), Some("df.fillna(0)"));
            }
            other => panic!("expected guard message, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_guard_event_full_sequence_preserves_order() {
        let mut transcript = Transcript::new();
        let events = [
            AgentEvent::GuardAnalyzing {
                step: "fit".to_string(),
                error: "boom".to_string(),
            },
            AgentEvent::WebSearching {
                query: "sklearn boom".to_string(),
            },
            AgentEvent::FixAttempt {
                explanation: "try again".to_string(),
                code: "fit(x)".to_string(),
            },
            AgentEvent::FixSuccess {
                explanation: "worked".to_string(),
            },
        ];
        for event in &events {
            assert!(apply_guard_event(&mut transcript, event));
        }
        let steps: Vec<GuardStep> = transcript.entries()[1..]
            .iter()
            .map(|e| match &e.message {
                ChatMessage::Guard { step, .. } => *step,
                other => panic!("expected guard message, got {:?}", other),
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                GuardStep::Analyzing,
                GuardStep::WebSearching,
                GuardStep::FixAttempt,
                GuardStep::FixSuccess,
            ]
        );
    }

    #[test]
    fn test_apply_guard_event_give_up() {
        let mut transcript = Transcript::new();
        apply_guard_event(
            &mut transcript,
            &AgentEvent::GiveUp {
                step: "feature_selection".to_string(),
            },
        );
        assert!(matches!(
            &transcript.entries()[1].message,
            ChatMessage::Guard { step: GuardStep::GiveUp, text, .. }
                if text.contains("feature_selection")
        ));
    }

    #[test]
    fn test_apply_guard_event_ignores_non_guard_events() {
        let mut transcript = Transcript::new();
        let applied = apply_guard_event(
            &mut transcript,
            &AgentEvent::Status {
                message: "not a guard event".to_string(),
            },
        );
        assert!(!applied);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_entry_roundtrips_through_serde() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::PredictionForm {
            columns: vec!["age".to_string(), "income".to_string()],
        });
        let json = serde_json::to_string(&transcript.entries()[1]).unwrap();
        let entry: TranscriptEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, transcript.entries()[1]);
    }
}
