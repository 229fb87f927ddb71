//! Prometheus text exposition format.
//!
//! Renders a [`MetricsSnapshot`] with every metric name prefixed `harness_`.
//! Histograms are exported as summaries (`_sum` and `_count`).

use crate::metrics::recorder::{MetricsSnapshot, SeriesKey};
use std::collections::BTreeMap;
use std::fmt::Write;

const PREFIX: &str = "harness";

fn help(name: &str) -> &'static str {
    match name {
        "players_total" => "Total players ever created.",
        "players_active" => "Current number of alive players.",
        "player_login_total" => "Login attempts outcome.",
        "player_login_duration_seconds" => "Login latency.",
        "scenario_started_total" => "Scenario executions started.",
        "scenario_completed_total" => "Scenario outcomes.",
        "scenario_duration_seconds" => "Time spent executing each scenario.",
        "scenarios_in_flight" => "Concurrent executions per scenario.",
        "compositor_desired_rate" => "Desired executions/sec per player.",
        "compositor_tick_executions" => "Number of executions scheduled per tick.",
        "compositor_idle_starvation_total" => {
            "Scenario wanted to run but no idle player was available."
        }
        "compositor_tick_lag_seconds" => "Delay between scheduled and actual tick.",
        "scenario_attempted_total" => "Dispatch attempts per scenario.",
        "pool_execute_wait_duration_seconds" => "Time waiting for an idle player.",
        "pool_idle_queue_depth" => "Current length of the idle queue.",
        "pool_idle_capacity" => "Capacity of the idle queue.",
        "context_cancellations_total" => "Where cancellations occurred.",
        "tick_duration_seconds" => "Internal scheduler loop duration.",
        "errors_total" => "Unexpected internal errors.",
        _ => "Harness metric.",
    }
}

fn labels(key: &SeriesKey) -> String {
    if key.labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = key
        .labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape(v)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Group series by metric name, keeping the snapshot's sorted order.
fn families<V: Copy>(series: &BTreeMap<SeriesKey, V>) -> BTreeMap<&'static str, Vec<(&SeriesKey, V)>> {
    let mut out: BTreeMap<&'static str, Vec<(&SeriesKey, V)>> = BTreeMap::new();
    for (key, value) in series {
        out.entry(key.name).or_default().push((key, *value));
    }
    out
}

fn header(out: &mut String, name: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {PREFIX}_{name} {}", help(name));
    let _ = writeln!(out, "# TYPE {PREFIX}_{name} {kind}");
}

/// Render every series in `snapshot` as Prometheus text.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    for (name, series) in families(&snapshot.counters) {
        header(&mut out, name, "counter");
        for (key, value) in series {
            let _ = writeln!(out, "{PREFIX}_{name}{} {value}", labels(key));
        }
    }

    for (name, series) in families(&snapshot.gauges) {
        header(&mut out, name, "gauge");
        for (key, value) in series {
            let _ = writeln!(out, "{PREFIX}_{name}{} {value}", labels(key));
        }
    }

    for (name, series) in families(&snapshot.histograms) {
        header(&mut out, name, "summary");
        for (key, summary) in series {
            let l = labels(key);
            let _ = writeln!(out, "{PREFIX}_{name}_sum{l} {:.6}", summary.sum);
            let _ = writeln!(out, "{PREFIX}_{name}_count{l} {}", summary.count);
        }
    }

    out
}
