//! # Player Pool
//!
//! The [`Pool`] owns the player population:
//!
//! - a **creation loop** that adds at most one player per tick while the live
//!   count is below target (this also replaces players lost to logout or
//!   login failure),
//! - a **monitor loop** that reports idle-queue depth and active players,
//! - the **idle queue**, capacity = target, which [`Pool::execute`] pops to hand
//!   a scenario to a ready player.
//!
//! `Pool` is a cheap, cloneable handle; all clones share the same population.

use crate::framework::compositor::ScenarioDispatcher;
use crate::framework::error::DispatchError;
use crate::framework::events::{CancelSource, HarnessEvent};
use crate::framework::idle_queue::IdleQueue;
use crate::framework::player::{IdleTicket, LifelineGuard, Player, PlayerId};
use crate::framework::registry::{PlayerHandle, PlayerRegistry};
use crate::framework::scenario::{Scenario, ScenarioContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Population settings. Immutable once the pool is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Live players the creation loop converges to. Also the idle-queue capacity.
    pub target_players: usize,
    /// One player is created per interval at most.
    pub creation_interval: Duration,
    /// How often idle depth and active players are reported.
    pub monitor_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_players: 1000,
            creation_interval: Duration::from_millis(100),
            monitor_interval: Duration::from_secs(1),
        }
    }
}

struct PoolShared {
    config: PoolConfig,
    idle: Arc<IdleQueue>,
    live: Arc<AtomicUsize>,
    next_id: AtomicU64,
    ctx: ScenarioContext,
}

#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    pub fn new(config: PoolConfig, ctx: ScenarioContext) -> Self {
        let idle = Arc::new(IdleQueue::new(config.target_players));
        ctx.events
            .record(HarnessEvent::IdleQueueCapacity(idle.capacity()));
        Self {
            shared: Arc::new(PoolShared {
                config,
                idle,
                live: Arc::new(AtomicUsize::new(0)),
                next_id: AtomicU64::new(1),
                ctx,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Spawn the creation and monitor loops. Both stop when `shutdown` is
    /// cancelled; every player lifeline runs under a child of `shutdown`.
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let creation = tokio::spawn(self.clone().run_creation_loop(shutdown.clone()));
        let monitor = tokio::spawn(self.clone().run_monitor_loop(shutdown));
        vec![creation, monitor]
    }

    /// Live players: created and not yet terminated.
    pub fn player_count(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Tickets waiting in the idle queue.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.len()
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.shared.ctx.registry
    }

    /// Terminate one specific player. Returns `false` if it is not live.
    pub fn logout(&self, id: PlayerId) -> bool {
        match self.registry().get(id) {
            Some(handle) => {
                debug!(player_id = id, "Logout requested");
                handle.terminate();
                true
            }
            None => false,
        }
    }

    /// Hand `scenario` to an idle player.
    ///
    /// An idle player is taken immediately if one is queued. Otherwise:
    /// - with `deadline = None`, fail fast with [`DispatchError::NoPlayerAvailable`];
    /// - with `deadline = Some(d)`, wait up to `d` for a player, then fail with
    ///   [`DispatchError::DeadlineExceeded`].
    ///
    /// `cancel` aborts the wait with [`DispatchError::Cancelled`]. It never
    /// affects the player that eventually receives the scenario.
    pub async fn execute(
        &self,
        scenario: Scenario,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let wait_start = Instant::now();
        let result = self.hand_off(scenario, deadline, cancel).await;
        match result {
            Ok(()) => self
                .shared
                .ctx
                .events
                .record(HarnessEvent::DispatchWait(wait_start.elapsed())),
            Err(DispatchError::Cancelled) => self
                .shared
                .ctx
                .events
                .record(HarnessEvent::Cancellation(CancelSource::Pool)),
            Err(_) => {}
        }
        result
    }

    async fn hand_off(
        &self,
        scenario: Scenario,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        let expires = deadline.map(|d| Instant::now() + d);

        loop {
            let ticket = self.next_ticket(expires, cancel).await?;
            let player_id = ticket.player_id;
            if ticket.deliver(scenario).await {
                debug!(player_id, scenario = scenario.name(), "Dispatched");
                return Ok(());
            }
            // Player terminated between queueing and hand-off.
            debug!(player_id, "Skipped stale idle ticket");
        }
    }

    async fn next_ticket(
        &self,
        expires: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<IdleTicket, DispatchError> {
        if let Some(ticket) = self.shared.idle.try_pop() {
            return Ok(ticket);
        }
        let Some(expires) = expires else {
            return Err(DispatchError::NoPlayerAvailable);
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            ticket = self.shared.idle.pop() => Ok(ticket),
            _ = tokio::time::sleep_until(expires) => Err(DispatchError::DeadlineExceeded),
        }
    }

    async fn run_creation_loop(self, shutdown: CancellationToken) {
        let config = &self.shared.config;
        info!(
            target_players = config.target_players,
            interval_ms = config.creation_interval.as_millis() as u64,
            "Pool started"
        );

        let mut ticker = tokio::time::interval(config.creation_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.shared.ctx.events.record(HarnessEvent::Cancellation(CancelSource::Shutdown));
                    break;
                }
                _ = ticker.tick() => {
                    let tick_start = Instant::now();
                    if self.player_count() < config.target_players {
                        self.spawn_player(&shutdown);
                    }
                    self.shared.ctx.events.record(HarnessEvent::TickDuration {
                        component: "pool",
                        duration: tick_start.elapsed(),
                    });
                }
            }
        }

        info!(players = self.player_count(), "Pool creation loop stopped");
    }

    fn spawn_player(&self, shutdown: &CancellationToken) {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
        let token = shutdown.child_token();

        let live = shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        shared.ctx.registry.insert(PlayerHandle::new(id, token.clone()));
        let guard = LifelineGuard::new(id, shared.live.clone(), shared.ctx.registry.clone());

        let player = Player::new(id, token, shared.idle.clone(), shared.ctx.clone());
        tokio::spawn(player.run(guard));
        debug!(player_id = id, live, "Player created");
    }

    async fn run_monitor_loop(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.shared.config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let events = &self.shared.ctx.events;
                    events.record(HarnessEvent::IdleQueueDepth(self.idle_count()));
                    events.record(HarnessEvent::PlayersActive(self.player_count()));
                }
            }
        }
    }
}

#[async_trait]
impl ScenarioDispatcher for Pool {
    fn player_count(&self) -> usize {
        Pool::player_count(self)
    }

    async fn execute(
        &self,
        scenario: Scenario,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        Pool::execute(self, scenario, deadline, cancel).await
    }
}
