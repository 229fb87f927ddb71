//! # Engine Errors
//!
//! Errors raised by the player/pool/compositor engine. Backend failures live in
//! [`crate::clients::BackendError`] and are wrapped by [`ScenarioError`].

use crate::clients::BackendError;

/// Outcome of a failed [`Pool::execute`](crate::framework::Pool::execute) call.
///
/// `NoPlayerAvailable` and `DeadlineExceeded` are backpressure signals, not
/// faults: the compositor records them as starvation and moves on.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no player available")]
    NoPlayerAvailable,
    #[error("dispatch deadline exceeded")]
    DeadlineExceeded,
    #[error("dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// True for the outcomes that mean "demand exceeded idle supply".
    pub fn is_starvation(&self) -> bool {
        matches!(
            self,
            DispatchError::NoPlayerAvailable | DispatchError::DeadlineExceeded
        )
    }
}

/// Errors a scenario body can return.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The player's lifeline was cancelled while the scenario ran.
    #[error("scenario cancelled")]
    Cancelled,
    /// The player is no longer in the registry (already terminated).
    #[error("player {0} is not registered")]
    PlayerGone(u64),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ScenarioError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScenarioError::Cancelled)
    }
}

/// A configured scenario name did not match any [`Scenario`](crate::framework::Scenario).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(pub String);
