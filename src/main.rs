//! # Player Harness
//!
//! Runs a population of simulated players against the gateway until Ctrl-C or
//! SIGTERM. Metrics are served at `http://<metrics_addr>/metrics` for the whole
//! run and printed in Prometheus text format on exit.
//!
//! ```bash
//! GATEWAY_HOSTNAME=gateway RUST_LOG=info cargo run -- --target-players 200
//! ```

use anyhow::Context;
use clap::Parser;
use player_harness::config::Cli;
use player_harness::lifecycle::{setup_tracing, HarnessSystem};
use player_harness::metrics::{render_prometheus, serve_metrics};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let cli = Cli::parse();
    let config = cli.resolve().context("loading configuration")?;
    info!(?config, "Configuration loaded");

    let metrics_addr = config.metrics_addr()?;
    let listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("binding metrics endpoint on {metrics_addr}"))?;

    let system = HarnessSystem::start(&config).context("starting harness")?;
    let metrics = system.metrics.clone();

    let server_shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_metrics(
        listener,
        metrics.clone(),
        server_shutdown.clone(),
    ));

    wait_for_signal().await?;
    info!("Signal received");

    let result = system.shutdown().await;

    server_shutdown.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Metrics endpoint failed"),
        Err(e) => error!(error = %e, "Metrics endpoint task failed"),
    }

    println!("{}", render_prometheus(&metrics.snapshot()));
    result.context("shutting down harness")
}

#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("waiting for Ctrl-C"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")
}
