//! Error taxonomy for playground operations.

use thiserror::Error;

/// Failures surfaced by playground operations.
///
/// Every operation boundary converts these into transcript or cell-level
/// messages before returning; callers get the value for exit codes and
/// logging, never as the only record of the failure.
#[derive(Debug, Error)]
pub enum LabError {
    /// Code rejected by the safety policy; no network call was made.
    #[error("{0}")]
    PolicyViolation(String),

    /// A backend could not be reached. Blocks execution-dependent
    /// actions until it clears.
    #[error("backend unavailable: {0}")]
    Connection(String),

    /// The remote interpreter reported an error for one cell.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A streaming stage failed mid-flight; events already applied
    /// remain valid.
    #[error("stream failed: {0}")]
    Stream(String),

    /// The operation is not valid in the current pipeline stage.
    #[error("{0}")]
    InvalidStage(String),
}
