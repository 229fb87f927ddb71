use crate::clients::{Backend, HttpBackend};
use crate::config::{ConfigResult, HarnessConfig};
use crate::framework::{Compositor, EventSink, Pool, ScenarioContext};
use crate::metrics::MetricsRecorder;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("{0} players still alive after the grace period")]
    PlayersLingering(usize),
}

/// The runtime orchestrator for a load run.
///
/// `HarnessSystem` is responsible for:
/// - **Wiring**: one backend, one metrics recorder, one [`Pool`] and one
///   [`Compositor`] sharing a [`ScenarioContext`]
/// - **Lifecycle**: starting the pool loops and the scheduling loop under a
///   single root [`CancellationToken`]
/// - **Shutdown**: cancelling that token and waiting for every player to exit
///
/// # Example
///
/// ```ignore
/// let config = HarnessConfig::default();
/// let system = HarnessSystem::start(&config)?;
///
/// tokio::signal::ctrl_c().await?;
/// system.shutdown().await?;
/// ```
pub struct HarnessSystem {
    pub pool: Pool,
    pub metrics: Arc<MetricsRecorder>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl HarnessSystem {
    /// Start against the HTTP gateway named in `config`.
    pub fn start(config: &HarnessConfig) -> ConfigResult<Self> {
        let backend = Arc::new(HttpBackend::new(config.gateway_url.clone()));
        info!(gateway = backend.base_url(), "Using HTTP backend");
        Self::start_with_backend(config, backend)
    }

    /// Start with any [`Backend`], e.g. [`MockBackend`](crate::framework::mock::MockBackend).
    pub fn start_with_backend(config: &HarnessConfig, backend: Arc<dyn Backend>) -> ConfigResult<Self> {
        config.validate()?;
        let scenarios = config.scenario_rates()?;

        let metrics = Arc::new(MetricsRecorder::new());
        let events: Arc<dyn EventSink> = metrics.clone();
        let ctx = ScenarioContext::new(backend, events.clone());
        let shutdown = CancellationToken::new();

        let pool = Pool::new(config.pool_config(), ctx);
        let mut handles = pool.start(shutdown.clone());

        let mut compositor = Compositor::new(Arc::new(pool.clone()), config.compositor_config(), events);
        for (scenario, rate) in scenarios {
            compositor.add_scenario(scenario, rate);
        }
        handles.push(compositor.start(shutdown.clone()));

        info!(
            target_players = config.target_players,
            scenarios = config.scenarios.len(),
            "Harness started"
        );

        Ok(Self {
            pool,
            metrics,
            shutdown,
            handles,
            grace: config.shutdown_grace(),
        })
    }

    /// Root token; cancelling it stops everything.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel the root token, join the loops, then wait up to the grace
    /// period for every player lifeline to exit.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        info!("Shutting down harness...");
        self.shutdown.cancel();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Harness task failed: {:?}", e);
                return Err(e.into());
            }
        }

        let deadline = Instant::now() + self.grace;
        while self.pool.player_count() > 0 && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        let lingering = self.pool.player_count();
        if lingering > 0 {
            warn!(lingering, "Players did not exit in time");
            return Err(ShutdownError::PlayersLingering(lingering));
        }

        info!("Harness shutdown complete.");
        Ok(())
    }
}
