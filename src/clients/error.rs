//! Error types for backend calls.

use thiserror::Error;

/// Errors returned by a [`Backend`](super::Backend) call.
///
/// The engine never inspects these beyond "it failed"; they exist for logs.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the response body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-200 status.
    #[error("{operation} failed with status code: {status}")]
    Status { operation: &'static str, status: u16 },

    /// The response body did not have the expected shape.
    #[error("failed to decode {operation} response: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("received empty ticketId")]
    EmptyTicket,

    #[error("matchmaking ticket cancelled")]
    MatchCancelled,

    #[error("matchmaking timed out for ticket {0}")]
    MatchTimeout(String),

    /// Failure injected by a test backend.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}
