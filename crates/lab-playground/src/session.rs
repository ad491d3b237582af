//! Remote session lifecycle.

use crate::error::LabError;
use lab_client::{AgentClient, ExecutionClient};
use log::{info, warn};

/// Holds the single opaque session id for this playground instance.
///
/// The id is created lazily on first need and lives until an explicit
/// reset. The epoch counter increments on every reset; async
/// continuations capture the dispatch-time epoch and drop their effects
/// if a reset happened while they were in flight.
#[derive(Debug, Default)]
pub struct SessionManager {
    id: Option<String>,
    last_error: Option<String>,
    epoch: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Persistent connection-error banner text, if the execution
    /// backend is down. Cleared by the next successful session create
    /// or by a reset.
    pub fn connection_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Return the current session id, creating one if needed.
    ///
    /// Idempotent: an existing id is returned without a network call.
    /// On failure the connection-error state is set and callers must
    /// not proceed with execution-dependent work.
    pub async fn ensure(&mut self, client: &ExecutionClient) -> Result<String, LabError> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }
        match client.create_session().await {
            Ok(id) => {
                self.last_error = None;
                self.id = Some(id.clone());
                Ok(id)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("[session] failed to create session: {message}");
                self.last_error = Some(message.clone());
                Err(LabError::Connection(message))
            }
        }
    }

    /// Tear down the remote session on both services and clear local
    /// state unconditionally. Teardown is advisory: failures are
    /// ignored by the clients.
    pub async fn reset(&mut self, execution: &ExecutionClient, agent: &AgentClient) {
        if let Some(id) = self.id.take() {
            info!("[session] resetting session {id}");
            execution.close_session(&id).await;
            agent.close_session(&id).await;
        }
        self.last_error = None;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A base URL nothing listens on: bind an ephemeral port, then drop
    /// the listener so connections are refused.
    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_ensure_failure_sets_connection_error() {
        let client = ExecutionClient::new(dead_url());
        let mut session = SessionManager::new();

        let result = session.ensure(&client).await;
        assert!(matches!(result, Err(LabError::Connection(_))));
        assert!(session.connection_error().is_some());
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_state_and_bumps_epoch() {
        let execution = ExecutionClient::new(dead_url());
        let agent = AgentClient::new(dead_url());
        let mut session = SessionManager::new();
        assert_eq!(session.epoch(), 0);

        // Failed ensure leaves a banner; reset must clear it.
        let _ = session.ensure(&execution).await;
        assert!(session.connection_error().is_some());

        session.reset(&execution, &agent).await;
        assert!(session.id().is_none());
        assert!(session.connection_error().is_none());
        assert_eq!(session.epoch(), 1);

        session.reset(&execution, &agent).await;
        assert_eq!(session.epoch(), 2);
    }
}
