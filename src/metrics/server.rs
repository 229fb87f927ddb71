//! HTTP endpoint serving the live metrics while the harness runs.

use crate::metrics::prometheus::render_prometheus;
use crate::metrics::recorder::MetricsRecorder;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `GET /metrics` rendering the recorder's current snapshot.
pub fn metrics_router(recorder: Arc<MetricsRecorder>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(recorder)
}

async fn metrics_handler(State(recorder): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        render_prometheus(&recorder.snapshot()),
    )
}

/// Serve [`metrics_router`] on `listener` until `shutdown` is cancelled.
pub async fn serve_metrics(
    listener: TcpListener,
    recorder: Arc<MetricsRecorder>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Serving metrics");
    }
    axum::serve(listener, metrics_router(recorder))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{EventSink, HarnessEvent};

    #[tokio::test]
    async fn serves_current_snapshot_until_shutdown() {
        let recorder = Arc::new(MetricsRecorder::new());
        recorder.record(HarnessEvent::PlayerCreated);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_metrics(listener, recorder.clone(), shutdown.clone()));

        let url = format!("http://{addr}/metrics");
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(body.contains("harness_players_total 1"));

        recorder.record(HarnessEvent::PlayerCreated);
        let response = reqwest::get(&url).await.unwrap();
        assert!(response.status().is_success());
        assert!(response.text().await.unwrap().contains("harness_players_total 2"));

        let missing = reqwest::get(format!("http://{addr}/other")).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
