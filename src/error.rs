//! Error types for the event transmission engine.

use thiserror::Error;

/// Errors returned synchronously from [`crate::Client::submit`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("api host must not be empty")]
    MissingApiHost,
    #[error("write key must not be empty")]
    MissingWriteKey,
    #[error("dataset must not be empty")]
    MissingDataset,
    #[error("event must carry at least one field")]
    EmptyFields,
    #[error("submit rejected: a flush is currently in progress")]
    Flushing,
}

/// Fatal errors from engine initialization.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),
    #[error("sink failed to start: {0}")]
    SinkStart(#[source] SinkError),
}

/// Errors a [`crate::Sink`] implementation may report from `start`/`stop`.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("{0}")]
    Other(String),
}

/// Per-event delivery outcome, surfaced on [`crate::Response`].
///
/// None of these abort the engine - each is always attached to a per-event
/// response rather than propagated as a `Result` error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("event dropped due to sampling")]
    SamplingDrop,

    #[error("event dropped: work queue full")]
    QueueOverflow,

    #[error("network error: {0}")]
    Transport(String),

    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("could not parse ingest response: {0}")]
    Parse(String),

    #[error("event dropped at shutdown: no sink available")]
    ShutdownDrop,
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

/// Errors from [`crate::verify_key`].
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid write key")]
    Unauthorized,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("could not parse team slug from response: {0}")]
    Parse(String),
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VerifyError::Timeout
        } else {
            VerifyError::Network(err)
        }
    }
}

impl VerifyError {
    /// Create error from an HTTP status code returned by `/1/team_slug`.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => VerifyError::Unauthorized,
            _ => VerifyError::Server {
                status,
                message: body,
            },
        }
    }
}
