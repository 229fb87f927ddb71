//! Metrics collected from engine events.
//!
//! - [`MetricsRecorder`] - [`EventSink`](crate::framework::EventSink) storing counters, gauges and summaries
//! - [`render_prometheus`] - Prometheus text exposition of a snapshot
//! - [`serve_metrics`] - `GET /metrics` endpoint over the live recorder

pub mod prometheus;
pub mod recorder;
pub mod server;

pub use prometheus::render_prometheus;
pub use recorder::{HistogramSummary, MetricsRecorder, MetricsSnapshot, SeriesKey};
pub use server::{metrics_router, serve_metrics};
