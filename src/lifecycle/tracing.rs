//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide `tracing` subscriber used by the
//! binary.
//!
//! - **Structured logging** with key-value fields (`player_id`, `scenario`, `ticket_id`)
//! - **Configurable log levels** via the `RUST_LOG` environment variable
//! - **Compact format**, no module path prefix
//!
//! ## What Gets Traced
//!
//! - **Lifecycle**: pool, compositor and harness start/stop at `info`
//! - **Players**: login, dispatch, follow-ups and termination at `debug`
//! - **Backend calls**: one span per HTTP operation via `#[instrument]`
//! - **Failures**: scenario and dispatch errors at `warn`
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Every player transition
//! RUST_LOG=debug cargo run
//!
//! # Only the engine
//! RUST_LOG=player_harness::framework=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` a single player's life reads:
//!
//! ```text
//! DEBUG Player created player_id=7 live=7
//! DEBUG Player started player_id=7
//! DEBUG Logged in player_id=7
//! DEBUG Dispatched player_id=7 scenario="matchmaking"
//! DEBUG matchmaking{player=7}: Joined matchmaking ticket_id="t-91"
//! DEBUG Player terminated player_id=7 pending=0
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Fields carry player_id/scenario; module paths add noise
        .compact() // Spans render inline, e.g. "matchmaking{player=7}"
        .init();
}
