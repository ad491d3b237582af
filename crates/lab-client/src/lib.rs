//! lab-client - Typed clients for the Lab Playground backend services.
//!
//! Two independent HTTP services are consumed: the execution service
//! (sessions, cell execution, dataset upload) and the agent service
//! (dataset analysis, pipeline building, prediction, chat). Both are
//! external collaborators; only their wire contracts live here.
//!
//! Streaming endpoints respond with event-formatted frames decoded by
//! [`stream::EventStream`].

pub mod agent;
pub mod error;
pub mod execution;
pub mod protocol;
pub mod stream;

pub use agent::AgentClient;
pub use error::ClientError;
pub use execution::ExecutionClient;
