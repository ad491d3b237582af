//! Error type shared by the execution and agent clients.

use thiserror::Error;

/// Error type for backend client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached at all (connect, timeout, or
    /// mid-transfer transport failure).
    #[error("failed to reach backend: {0}")]
    ConnectionFailed(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether the service looks down (as opposed to rejecting a request).
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::ConnectionFailed(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::ConnectionFailed(_) => true,
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::Protocol(_) => false,
        }
    }
}

/// Pass a response through, converting non-2xx statuses into
/// [`ClientError::Status`] with the body attached for diagnostics.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}
