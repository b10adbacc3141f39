//! Per-event delivery outcomes surfaced to the caller.

use crate::error::DeliveryError;
use std::time::Duration;

/// The server's per-event ingest status, positionally matched from the
/// batch response body (`{status, error}`).
#[derive(Clone, Debug, serde::Deserialize)]
pub struct EventStatus {
    pub status: u16,
    #[serde(default)]
    pub error: Option<String>,
}

/// The outcome of one submitted event: success, server error, network
/// error, sample drop, or overflow drop.
#[derive(Clone, Debug)]
pub struct Response<M = ()> {
    /// HTTP status code, or 0 for local errors (sampling/overflow/shutdown drops).
    pub status_code: u16,
    /// Raw response body snippet, when one was available.
    pub body: Option<String>,
    /// Wall-clock time spent dispatching the batch this event belonged to.
    pub duration: Duration,
    /// Caller metadata copied verbatim from the originating event.
    pub metadata: Option<M>,
    /// Error, if any.
    pub err: Option<DeliveryError>,
}

impl<M> Response<M> {
    pub fn success(status_code: u16, body: Option<String>, duration: Duration, metadata: Option<M>) -> Self {
        Self {
            status_code,
            body,
            duration,
            metadata,
            err: None,
        }
    }

    pub fn error(err: DeliveryError, metadata: Option<M>) -> Self {
        Self {
            status_code: 0,
            body: None,
            duration: Duration::ZERO,
            metadata,
            err: Some(err),
        }
    }

    pub fn server_error(status_code: u16, message: String, duration: Duration, metadata: Option<M>) -> Self {
        Self {
            status_code,
            body: Some(message.clone()),
            duration,
            metadata,
            err: Some(DeliveryError::Server {
                status: status_code,
                message,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}
