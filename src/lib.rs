//! # Player Harness
//!
//! > **Synthetic player load for a game backend.**
//!
//! This crate drives a backend with a population of long-lived simulated
//! players. Each player logs in once, then alternates between idle and busy,
//! executing whatever scenario the compositor hands it. The aggregate
//! execution rate of every scenario tracks `population × per-player rate`.
//!
//! ## 🏗️ Design
//!
//! ### Players are tasks, not requests
//! A player is one Tokio task (its *lifeline*) with its own cancellation
//! token. It executes one scenario at a time, runs its own follow-ups before
//! accepting new work, and re-enters the idle queue after every execution.
//!
//! ### Demand is a rate, not a count
//! The compositor converts per-player rates into whole executions with a
//! fractional accumulator, so low rates still fire at the right long-run
//! frequency. When no player is idle the attempt is dropped and counted as
//! starvation; the backlog is never queued.
//!
//! ### Events instead of globals
//! The engine reports everything through an injected
//! [`EventSink`](framework::EventSink). [`MetricsRecorder`](metrics::MetricsRecorder)
//! turns events into counters, gauges and summaries.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! - **Role**: Population control, player state machine, rate scheduling.
//! - **Key items**: [`Pool`](framework::Pool), [`Compositor`](framework::Compositor),
//!   [`Scenario`](framework::Scenario).
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: Wires backend, metrics, pool and compositor; owns shutdown.
//! - **Key items**: [`HarnessSystem`](lifecycle::HarnessSystem),
//!   [`setup_tracing`](lifecycle::setup_tracing).
//!
//! ### 3. The Interface ([`clients`])
//! - **Role**: The [`Backend`](clients::Backend) trait scenarios call, and its
//!   HTTP implementation.
//!
//! ### 4. Support ([`config`], [`metrics`], [`model`])
//! - TOML + CLI configuration, Prometheus rendering and the `/metrics`
//!   endpoint, match data.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run against a local gateway with info logs
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test
//! ```

pub mod clients;
pub mod config;
pub mod framework;
pub mod lifecycle;
pub mod metrics;
pub mod model;
