//! In-memory metric store fed by [`HarnessEvent`]s.
//!
//! Series are keyed by name plus a sorted label set. Counters and histograms
//! only grow; gauges hold the last value written.

use crate::framework::events::{EventSink, HarnessEvent};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

pub type Labels = Vec<(&'static str, &'static str)>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeriesKey {
    pub name: &'static str,
    pub labels: Labels,
}

impl SeriesKey {
    fn new(name: &'static str, mut labels: Labels) -> Self {
        labels.sort();
        Self { name, labels }
    }

    fn matches(&self, name: &str, labels: &[(&str, &str)]) -> bool {
        if self.name != name || self.labels.len() != labels.len() {
            return false;
        }
        labels
            .iter()
            .all(|(k, v)| self.labels.iter().any(|(lk, lv)| lk == k && lv == v))
    }
}

/// Observation count and sum, enough for a Prometheus summary without quantiles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
}

impl HistogramSummary {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Point-in-time copy of every series.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<SeriesKey, u64>,
    pub gauges: BTreeMap<SeriesKey, f64>,
    pub histograms: BTreeMap<SeriesKey, HistogramSummary>,
}

#[derive(Default)]
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    /// Counter value, `0` if the series was never touched.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.lock()
            .counters
            .iter()
            .find(|(key, _)| key.matches(name, labels))
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    /// Gauge value, `0.0` if the series was never set.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        self.lock()
            .gauges
            .iter()
            .find(|(key, _)| key.matches(name, labels))
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        self.lock()
            .histograms
            .iter()
            .find(|(key, _)| key.matches(name, labels))
            .map(|(_, v)| *v)
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for MetricsRecorder {
    fn record(&self, event: HarnessEvent) {
        let mut m = self.lock();
        match event {
            HarnessEvent::PlayerCreated => inc(&mut m, "players_total", vec![]),
            HarnessEvent::PlayerLogin { success, duration } => {
                let status = if success { "success" } else { "failure" };
                inc(&mut m, "player_login_total", vec![("status", status)]);
                if success {
                    observe(&mut m, "player_login_duration_seconds", vec![], duration);
                }
            }
            HarnessEvent::ScenarioStarted { scenario } => {
                inc(&mut m, "scenario_started_total", vec![("scenario", scenario)]);
                add_gauge(&mut m, "scenarios_in_flight", vec![("scenario", scenario)], 1.0);
            }
            HarnessEvent::ScenarioCompleted {
                scenario,
                status,
                duration,
            } => {
                inc(
                    &mut m,
                    "scenario_completed_total",
                    vec![("scenario", scenario), ("status", status.as_str())],
                );
                observe(
                    &mut m,
                    "scenario_duration_seconds",
                    vec![("scenario", scenario)],
                    duration,
                );
                add_gauge(&mut m, "scenarios_in_flight", vec![("scenario", scenario)], -1.0);
            }
            HarnessEvent::PlayersActive(n) => set_gauge(&mut m, "players_active", vec![], n as f64),
            HarnessEvent::IdleQueueDepth(n) => {
                set_gauge(&mut m, "pool_idle_queue_depth", vec![], n as f64)
            }
            HarnessEvent::IdleQueueCapacity(n) => {
                set_gauge(&mut m, "pool_idle_capacity", vec![], n as f64)
            }
            HarnessEvent::DesiredRate { scenario, rate } => {
                set_gauge(&mut m, "compositor_desired_rate", vec![("scenario", scenario)], rate)
            }
            HarnessEvent::TickExecutions {
                scenario,
                executions,
            } => {
                let key = SeriesKey::new("compositor_tick_executions", vec![("scenario", scenario)]);
                m.histograms.entry(key).or_default().observe(executions as f64);
            }
            HarnessEvent::TickLag { scenario, lag } => set_gauge(
                &mut m,
                "compositor_tick_lag_seconds",
                vec![("scenario", scenario)],
                lag.as_secs_f64(),
            ),
            HarnessEvent::DispatchAttempted { scenario } => {
                inc(&mut m, "scenario_attempted_total", vec![("scenario", scenario)])
            }
            HarnessEvent::IdleStarvation { scenario } => inc(
                &mut m,
                "compositor_idle_starvation_total",
                vec![("scenario", scenario)],
            ),
            HarnessEvent::DispatchWait(wait) => {
                observe(&mut m, "pool_execute_wait_duration_seconds", vec![], wait)
            }
            HarnessEvent::Cancellation(source) => inc(
                &mut m,
                "context_cancellations_total",
                vec![("source", source.as_str())],
            ),
            HarnessEvent::TickDuration {
                component,
                duration,
            } => observe(
                &mut m,
                "tick_duration_seconds",
                vec![("component", component)],
                duration,
            ),
            HarnessEvent::InternalError { component, reason } => inc(
                &mut m,
                "errors_total",
                vec![("component", component), ("reason", reason)],
            ),
        }
    }
}

fn inc(m: &mut MetricsSnapshot, name: &'static str, labels: Labels) {
    *m.counters.entry(SeriesKey::new(name, labels)).or_insert(0) += 1;
}

fn set_gauge(m: &mut MetricsSnapshot, name: &'static str, labels: Labels, value: f64) {
    m.gauges.insert(SeriesKey::new(name, labels), value);
}

fn add_gauge(m: &mut MetricsSnapshot, name: &'static str, labels: Labels, delta: f64) {
    *m.gauges.entry(SeriesKey::new(name, labels)).or_insert(0.0) += delta;
}

fn observe(m: &mut MetricsSnapshot, name: &'static str, labels: Labels, value: Duration) {
    m.histograms
        .entry(SeriesKey::new(name, labels))
        .or_default()
        .observe(value.as_secs_f64());
}
