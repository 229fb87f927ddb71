//! # Player Lifeline
//!
//! A [`Player`] is one simulated end-user session. It owns exactly one tokio
//! task (its lifeline) and nothing in it is shared with other players except
//! the idle queue it offers itself on.
//!
//! ```text
//! Created -> LoggingIn -> { Idle <-> Busy } -> Terminated
//! ```
//!
//! - **LoggingIn**: runs [`Scenario::Login`]. A failure ends the lifeline.
//! - **Idle**: sends an [`IdleTicket`] on the idle queue, then waits on the
//!   ticket's one-shot mailbox for an assignment. The player acknowledges a
//!   [`Delivery`] only if it is still alive, so a dispatcher never hands work
//!   to a player that is already on its way out.
//! - **Busy**: runs the assigned scenario, raced against the lifeline token.
//!   Follow-ups that fire are queued and run before the player goes idle again.
//!
//! Every exit path drops the [`LifelineGuard`], which decrements the pool's
//! live counter and removes the registry entry exactly once.

use crate::framework::error::ScenarioError;
use crate::framework::events::{CancelSource, HarnessEvent, ScenarioStatus};
use crate::framework::idle_queue::IdleQueue;
use crate::framework::registry::PlayerRegistry;
use crate::framework::scenario::{Scenario, ScenarioContext};
use crate::model::MatchInfo;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Process-unique player identity. Never reused.
pub type PlayerId = u64;

/// What a player puts on the idle queue: its id, its lifeline token and the
/// sending half of a single-use mailbox. Whoever pops the ticket delivers at
/// most one scenario.
#[derive(Debug)]
pub(crate) struct IdleTicket {
    pub(crate) player_id: PlayerId,
    pub(crate) token: CancellationToken,
    pub(crate) mailbox: oneshot::Sender<Delivery>,
}

/// A scenario in flight to an idle player. The player answers on `accepted`
/// once it commits to running it.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) scenario: Scenario,
    pub(crate) accepted: oneshot::Sender<()>,
}

impl IdleTicket {
    /// The player is still waiting on this ticket.
    pub(crate) fn is_live(&self) -> bool {
        !self.mailbox.is_closed() && !self.token.is_cancelled()
    }

    /// Hand `scenario` to the player and wait for it to accept. Returns `false`
    /// if the player terminated instead; the scenario did not run.
    pub(crate) async fn deliver(self, scenario: Scenario) -> bool {
        let (accepted, ack) = oneshot::channel();
        if self.mailbox.send(Delivery { scenario, accepted }).is_err() {
            return false;
        }
        ack.await.is_ok()
    }
}

/// Outcome of one idle wait.
enum Assignment {
    Accepted(Scenario),
    /// The dispatcher gave up before the player accepted.
    Withdrawn,
    Ended,
}

/// Per-player state a scenario may read or update.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    id: PlayerId,
    match_info: Option<MatchInfo>,
}

impl PlayerSession {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            match_info: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn match_info(&self) -> Option<&MatchInfo> {
        self.match_info.as_ref()
    }

    pub(crate) fn set_match_info(&mut self, info: MatchInfo) {
        self.match_info = Some(info);
    }
}

/// Releases a player's share of pool state when its lifeline ends.
pub(crate) struct LifelineGuard {
    id: PlayerId,
    live: Arc<AtomicUsize>,
    registry: PlayerRegistry,
}

impl LifelineGuard {
    /// Must be created right after `live` was incremented for this player.
    pub(crate) fn new(id: PlayerId, live: Arc<AtomicUsize>, registry: PlayerRegistry) -> Self {
        Self { id, live, registry }
    }
}

impl Drop for LifelineGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct Player {
    session: PlayerSession,
    token: CancellationToken,
    pending: VecDeque<Scenario>,
    idle: Arc<IdleQueue>,
    ctx: ScenarioContext,
}

impl Player {
    pub(crate) fn new(
        id: PlayerId,
        token: CancellationToken,
        idle: Arc<IdleQueue>,
        ctx: ScenarioContext,
    ) -> Self {
        ctx.events.record(HarnessEvent::PlayerCreated);
        Self {
            session: PlayerSession::new(id),
            token,
            pending: VecDeque::new(),
            idle,
            ctx,
        }
    }

    /// The player's lifeline. Returns when the player terminates.
    pub(crate) async fn run(mut self, _lifeline: LifelineGuard) {
        let player_id = self.session.id();
        debug!(player_id, "Player started");

        if !self.login().await {
            return;
        }

        loop {
            if self.token.is_cancelled() {
                break;
            }

            let scenario = match self.pending.pop_front() {
                Some(follow_up) => follow_up,
                None => match self.wait_for_assignment().await {
                    Assignment::Accepted(assigned) => assigned,
                    Assignment::Withdrawn => continue,
                    Assignment::Ended => break,
                },
            };

            if !self.execute(scenario).await {
                break;
            }
        }

        debug!(player_id, pending = self.pending.len(), "Player terminated");
    }

    async fn login(&mut self) -> bool {
        let player_id = self.session.id();
        let start = Instant::now();
        match self.run_scenario(Scenario::Login).await {
            Ok(()) => {
                self.ctx.events.record(HarnessEvent::PlayerLogin {
                    success: true,
                    duration: start.elapsed(),
                });
                debug!(player_id, "Logged in");
                true
            }
            Err(e) => {
                self.ctx.events.record(HarnessEvent::PlayerLogin {
                    success: false,
                    duration: start.elapsed(),
                });
                if e.is_cancelled() {
                    debug!(player_id, "Login cancelled");
                } else {
                    warn!(player_id, error = %e, "Login failed");
                }
                false
            }
        }
    }

    /// Offer this player on the idle queue and wait for one assignment.
    ///
    /// Ends the lifeline on cancellation, or when the ticket was dropped
    /// without an assignment. A cancelled player withdraws its ticket so the
    /// queue slot goes to its replacement.
    async fn wait_for_assignment(&mut self) -> Assignment {
        let player_id = self.session.id();
        let (mailbox, assignment) = oneshot::channel();
        let ticket = IdleTicket {
            player_id,
            token: self.token.clone(),
            mailbox,
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.ctx.events.record(HarnessEvent::Cancellation(CancelSource::PlayerIdleWait));
                return Assignment::Ended;
            }
            _ = self.idle.offer(ticket) => {}
        }

        let delivery = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.idle.withdraw(player_id);
                self.ctx.events.record(HarnessEvent::Cancellation(CancelSource::PlayerScenarioWait));
                return Assignment::Ended;
            }
            delivery = assignment => match delivery {
                Ok(delivery) => delivery,
                Err(_) => return Assignment::Ended,
            },
        };

        if delivery.accepted.send(()).is_err() {
            debug!(player_id, "Assignment withdrawn");
            return Assignment::Withdrawn;
        }
        Assignment::Accepted(delivery.scenario)
    }

    /// Run one scenario to completion. Returns `false` when the lifeline must end.
    async fn execute(&mut self, scenario: Scenario) -> bool {
        let player_id = self.session.id();
        let name = scenario.name();
        self.ctx
            .events
            .record(HarnessEvent::ScenarioStarted { scenario: name });

        let start = Instant::now();
        let result = self.run_scenario(scenario).await;
        let duration = start.elapsed();

        let status = match &result {
            Ok(()) => ScenarioStatus::Success,
            Err(e) if e.is_cancelled() => ScenarioStatus::Cancelled,
            Err(e) => {
                warn!(player_id, scenario = name, error = %e, "Scenario failed");
                ScenarioStatus::Failure
            }
        };
        self.ctx.events.record(HarnessEvent::ScenarioCompleted {
            scenario: name,
            status,
            duration,
        });

        match status {
            ScenarioStatus::Success => self.queue_follow_ups(&scenario),
            ScenarioStatus::Cancelled => return false,
            ScenarioStatus::Failure => {}
        }

        // A logout cancels the token from inside a successful run.
        !self.token.is_cancelled()
    }

    async fn run_scenario(&mut self, scenario: Scenario) -> Result<(), ScenarioError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ScenarioError::Cancelled),
            result = scenario.run(&mut self.session, &self.ctx) => result,
        }
    }

    fn queue_follow_ups(&mut self, scenario: &Scenario) {
        let mut rng = rand::thread_rng();
        for follow_up in scenario.follow_ups() {
            if follow_up.roll(&mut rng) {
                debug!(
                    player_id = self.session.id(),
                    scenario = follow_up.scenario.name(),
                    "Queued follow-up"
                );
                self.pending.push_back(follow_up.scenario);
            }
        }
    }
}
