//! # Scenario Compositor
//!
//! The compositor turns per-player rates into dispatches. Every tick it reads
//! the live population once and, for each registered scenario, adds
//! `population × rate × tick_secs` to a fractional accumulator. The integer part
//! is dispatched this tick and the remainder carries over, so the long-run
//! execution rate matches the desired rate regardless of the tick size.
//!
//! Dispatch goes through the [`ScenarioDispatcher`] seam, implemented by
//! [`Pool`](crate::framework::Pool). Each unit gets its own deadline; a unit
//! that finds no idle player counts as starvation and is dropped, never
//! retried.

use crate::framework::error::DispatchError;
use crate::framework::events::{EventSink, HarnessEvent};
use crate::framework::scenario::Scenario;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can hand a scenario to a player.
#[async_trait]
pub trait ScenarioDispatcher: Send + Sync + 'static {
    /// Current live population.
    fn player_count(&self) -> usize;

    async fn execute(
        &self,
        scenario: Scenario,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    pub tick_interval: Duration,
    /// Deadline for a single dispatch attempt.
    pub dispatch_deadline: Duration,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            dispatch_deadline: Duration::from_millis(50),
        }
    }
}

/// Fractional execution budget for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RateAccumulator {
    rate: f64,
    carry: f64,
}

impl RateAccumulator {
    /// `rate` is executions per player per second. Negative or non-finite
    /// rates schedule nothing.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        Self { rate, carry: 0.0 }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Remainder carried into the next tick. Always in `[0, 1)`.
    pub fn carry(&self) -> f64 {
        self.carry
    }

    /// Executions earned by one tick. An empty population earns nothing and
    /// leaves the carry untouched.
    pub fn earn(&mut self, population: usize, tick: Duration) -> u64 {
        if population == 0 {
            return 0;
        }
        self.carry += population as f64 * self.rate * tick.as_secs_f64();
        let executions = self.carry.floor();
        self.carry -= executions;
        executions as u64
    }
}

struct ScenarioEntry {
    scenario: Scenario,
    accumulator: RateAccumulator,
}

pub struct Compositor<D: ScenarioDispatcher> {
    dispatcher: Arc<D>,
    config: CompositorConfig,
    events: Arc<dyn EventSink>,
    entries: Vec<ScenarioEntry>,
}

impl<D: ScenarioDispatcher> Compositor<D> {
    pub fn new(dispatcher: Arc<D>, config: CompositorConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            dispatcher,
            config,
            events,
            entries: Vec::new(),
        }
    }

    /// Register `scenario` at `rate` executions per player per second.
    pub fn add_scenario(&mut self, scenario: Scenario, rate: f64) {
        let accumulator = RateAccumulator::new(rate);
        self.events.record(HarnessEvent::DesiredRate {
            scenario: scenario.name(),
            rate: accumulator.rate(),
        });
        info!(scenario = scenario.name(), rate = accumulator.rate(), "Scenario registered");
        self.entries.push(ScenarioEntry { scenario, accumulator });
    }

    pub fn scenario_count(&self) -> usize {
        self.entries.len()
    }

    /// Spawn the scheduling loop. It stops when `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, shutdown: CancellationToken) {
        info!(
            scenarios = self.entries.len(),
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "Compositor started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                scheduled = ticker.tick() => self.tick(scheduled, &shutdown),
            }
        }

        info!("Compositor stopped");
    }

    fn tick(&mut self, scheduled: Instant, shutdown: &CancellationToken) {
        let tick_start = Instant::now();
        let lag = tick_start.saturating_duration_since(scheduled);
        let population = self.dispatcher.player_count();

        for entry in &mut self.entries {
            let name = entry.scenario.name();
            self.events.record(HarnessEvent::TickLag { scenario: name, lag });

            let executions = entry.accumulator.earn(population, self.config.tick_interval);
            if executions == 0 {
                continue;
            }
            self.events.record(HarnessEvent::TickExecutions {
                scenario: name,
                executions,
            });

            for _ in 0..executions {
                tokio::spawn(dispatch_one(
                    self.dispatcher.clone(),
                    self.events.clone(),
                    entry.scenario,
                    self.config.dispatch_deadline,
                    shutdown.clone(),
                ));
            }
        }

        self.events.record(HarnessEvent::TickDuration {
            component: "compositor",
            duration: tick_start.elapsed(),
        });
    }
}

/// One dispatch attempt with its own deadline. Starvation drops the unit.
async fn dispatch_one<D: ScenarioDispatcher>(
    dispatcher: Arc<D>,
    events: Arc<dyn EventSink>,
    scenario: Scenario,
    deadline: Duration,
    shutdown: CancellationToken,
) {
    let name = scenario.name();
    events.record(HarnessEvent::DispatchAttempted { scenario: name });

    match dispatcher.execute(scenario, Some(deadline), &shutdown).await {
        Ok(()) | Err(DispatchError::Cancelled) => {}
        Err(e) if e.is_starvation() => {
            debug!(scenario = name, error = %e, "Idle starvation");
            events.record(HarnessEvent::IdleStarvation { scenario: name });
        }
        Err(e) => {
            warn!(scenario = name, error = %e, "Dispatch failed");
            events.record(HarnessEvent::InternalError {
                component: "compositor",
                reason: "execute_scenario",
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRecorder;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// Dispatcher with a fixed population that accepts or starves every call.
    struct FixedDispatcher {
        population: AtomicUsize,
        starve: bool,
        calls: AtomicU64,
    }

    impl FixedDispatcher {
        fn new(population: usize, starve: bool) -> Arc<Self> {
            Arc::new(Self {
                population: AtomicUsize::new(population),
                starve,
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl ScenarioDispatcher for FixedDispatcher {
        fn player_count(&self) -> usize {
            self.population.load(Ordering::SeqCst)
        }

        async fn execute(
            &self,
            _scenario: Scenario,
            _deadline: Option<Duration>,
            _cancel: &CancellationToken,
        ) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.starve {
                Err(DispatchError::NoPlayerAvailable)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn accumulator_carries_fractions() {
        let mut acc = RateAccumulator::new(1.0);
        let tick = Duration::from_millis(250);

        let earned: Vec<u64> = (0..8).map(|_| acc.earn(1, tick)).collect();
        assert_eq!(earned, vec![0, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(acc.carry(), 0.0);
    }

    #[test]
    fn accumulator_converges_over_many_ticks() {
        // 0.3 executions per tick.
        let mut acc = RateAccumulator::new(3.0);
        let tick = Duration::from_millis(100);

        let mut total = 0;
        for _ in 0..1000 {
            total += acc.earn(1, tick);
            assert!(acc.carry() >= 0.0 && acc.carry() < 1.0);
        }
        assert!((299..=300).contains(&total), "total = {total}");
    }

    #[test]
    fn accumulator_skips_empty_population() {
        let mut acc = RateAccumulator::new(1.0);
        assert_eq!(acc.earn(1, Duration::from_millis(500)), 0);
        assert_eq!(acc.carry(), 0.5);

        assert_eq!(acc.earn(0, Duration::from_secs(10)), 0);
        assert_eq!(acc.carry(), 0.5);
    }

    #[test]
    fn invalid_rates_schedule_nothing() {
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            let mut acc = RateAccumulator::new(rate);
            assert_eq!(acc.earn(100, Duration::from_secs(1)), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_rate_tracks_population() {
        let dispatcher = FixedDispatcher::new(100, false);
        let recorder = Arc::new(MetricsRecorder::new());
        let mut compositor =
            Compositor::new(dispatcher.clone(), CompositorConfig::default(), recorder.clone());
        compositor.add_scenario(Scenario::Matchmaking, 1.0);

        let shutdown = CancellationToken::new();
        let handle = compositor.start(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.cancel();
        handle.await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let calls = dispatcher.calls.load(Ordering::SeqCst);
        assert!((990..=1020).contains(&calls), "calls = {calls}");
        assert_eq!(
            recorder.gauge("compositor_desired_rate", &[("scenario", "matchmaking")]),
            1.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_population_dispatches_nothing() {
        let dispatcher = FixedDispatcher::new(0, false);
        let mut compositor =
            Compositor::new(dispatcher.clone(), CompositorConfig::default(), Arc::new(crate::framework::NullSink));
        compositor.add_scenario(Scenario::StorePurchase, 5.0);

        let shutdown = CancellationToken::new();
        let handle = compositor.start(shutdown.clone());
        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn starvation_is_counted_per_attempt() {
        let dispatcher = FixedDispatcher::new(10, true);
        let recorder = Arc::new(MetricsRecorder::new());
        let mut compositor =
            Compositor::new(dispatcher.clone(), CompositorConfig::default(), recorder.clone());
        // One execution per tick.
        compositor.add_scenario(Scenario::Matchmaking, 1.0);

        let shutdown = CancellationToken::new();
        let handle = compositor.start(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(450)).await;
        shutdown.cancel();
        handle.await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let attempts = recorder.counter("scenario_attempted_total", &[("scenario", "matchmaking")]);
        let starved = recorder.counter(
            "compositor_idle_starvation_total",
            &[("scenario", "matchmaking")],
        );
        assert!(attempts >= 4);
        assert_eq!(attempts, starved);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), attempts);
    }
}
