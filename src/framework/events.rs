//! # Harness Events
//!
//! Every meaningful transition in the engine is reported as a [`HarnessEvent`]
//! to an injected [`EventSink`]. The engine never touches process-wide metric
//! state; whoever builds the [`Pool`](crate::framework::Pool) and
//! [`Compositor`](crate::framework::Compositor) decides where events go.
//!
//! [`MetricsRecorder`](crate::metrics::MetricsRecorder) is the production sink.
//! [`NullSink`] discards everything.

use std::time::Duration;

/// Final status of one scenario execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioStatus {
    Success,
    Failure,
    Cancelled,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Success => "success",
            ScenarioStatus::Failure => "failure",
            ScenarioStatus::Cancelled => "cancelled",
        }
    }
}

/// Where a cancellation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelSource {
    /// Player was waiting to enter the idle queue.
    PlayerIdleWait,
    /// Player was idle, waiting for an assignment.
    PlayerScenarioWait,
    /// A dispatch attempt gave up because its caller was cancelled.
    Pool,
    /// The creation loop stopped.
    Shutdown,
}

impl CancelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelSource::PlayerIdleWait => "player_idle_wait",
            CancelSource::PlayerScenarioWait => "player_scenario_wait",
            CancelSource::Pool => "pool",
            CancelSource::Shutdown => "shutdown",
        }
    }
}

/// Labeled counter/gauge/histogram events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessEvent {
    PlayerCreated,
    PlayerLogin {
        success: bool,
        duration: Duration,
    },
    ScenarioStarted {
        scenario: &'static str,
    },
    ScenarioCompleted {
        scenario: &'static str,
        status: ScenarioStatus,
        duration: Duration,
    },
    PlayersActive(usize),
    IdleQueueDepth(usize),
    IdleQueueCapacity(usize),
    DesiredRate {
        scenario: &'static str,
        rate: f64,
    },
    TickExecutions {
        scenario: &'static str,
        executions: u64,
    },
    TickLag {
        scenario: &'static str,
        lag: Duration,
    },
    DispatchAttempted {
        scenario: &'static str,
    },
    IdleStarvation {
        scenario: &'static str,
    },
    DispatchWait(Duration),
    Cancellation(CancelSource),
    TickDuration {
        component: &'static str,
        duration: Duration,
    },
    InternalError {
        component: &'static str,
        reason: &'static str,
    },
}

/// Capability accepting engine events.
///
/// Implementations must be cheap and non-blocking: `record` is called from
/// player lifelines and the scheduling loop.
pub trait EventSink: Send + Sync + 'static {
    fn record(&self, event: HarnessEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: HarnessEvent) {}
}
