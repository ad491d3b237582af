//! Liveness probes for the two backend services.
//!
//! Each probe uses the clients' short health timeout and degrades to
//! Offline instead of blocking; the two services are polled
//! independently.

use lab_client::{AgentClient, ExecutionClient};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

/// Health snapshot for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Online => write!(f, "online"),
            ServiceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Combined health of both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub execution: ServiceStatus,
    pub agent: ServiceStatus,
}

impl BackendHealth {
    pub fn all_online(&self) -> bool {
        self.execution == ServiceStatus::Online && self.agent == ServiceStatus::Online
    }

    fn offline() -> Self {
        Self {
            execution: ServiceStatus::Offline,
            agent: ServiceStatus::Offline,
        }
    }
}

fn status(up: bool) -> ServiceStatus {
    if up {
        ServiceStatus::Online
    } else {
        ServiceStatus::Offline
    }
}

/// Probe both services once, concurrently.
pub async fn check(execution: &ExecutionClient, agent: &AgentClient) -> BackendHealth {
    let (execution_up, agent_up) = tokio::join!(execution.health(), agent.health());
    BackendHealth {
        execution: status(execution_up),
        agent: status(agent_up),
    }
}

/// Spawn a background poller publishing health on a watch channel.
///
/// The poller stops when every receiver is dropped.
pub fn spawn_monitor(
    execution: ExecutionClient,
    agent: AgentClient,
    interval: Duration,
) -> watch::Receiver<BackendHealth> {
    let (tx, rx) = watch::channel(BackendHealth::offline());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let health = check(&execution, &agent).await;
            if tx.send(health).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_check_reports_offline_for_unreachable_services() {
        let execution = ExecutionClient::new(dead_url());
        let agent = AgentClient::new(dead_url());
        let health = check(&execution, &agent).await;
        assert_eq!(health.execution, ServiceStatus::Offline);
        assert_eq!(health.agent, ServiceStatus::Offline);
        assert!(!health.all_online());
    }

    #[test]
    fn test_all_online_requires_both() {
        let health = BackendHealth {
            execution: ServiceStatus::Online,
            agent: ServiceStatus::Offline,
        };
        assert!(!health.all_online());
        let health = BackendHealth {
            execution: ServiceStatus::Online,
            agent: ServiceStatus::Online,
        };
        assert!(health.all_online());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ServiceStatus::Online.to_string(), "online");
        assert_eq!(ServiceStatus::Offline.to_string(), "offline");
    }
}
