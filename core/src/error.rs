use thiserror::Error;

/// A request never produced an HTTP response (connection refused, DNS, timeout).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Failures of a call to the AI backend, after the retry policy has run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("The recipe service is busy after {attempts} attempts, please try again: {message}")]
    RetryExhausted { attempts: u32, message: String },
    #[error("The recipe service returned an unexpected response: {0}")]
    NonRetryable(String),
    #[error("Failed to reach the recipe service: {0}")]
    Network(String),
}

/// Failures of the remote persistence store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to reach remote store: {0}")]
    Transport(String),
    #[error("Failed to decode remote store response: {0}")]
    Decode(String),
}

impl From<TransportError> for RemoteError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e.0)
    }
}
