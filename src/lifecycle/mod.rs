//! Runtime orchestration and lifecycle management.
//!
//! - [`HarnessSystem`] - Wires backend, metrics, pool and compositor under one shutdown token
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod harness_system;
pub mod tracing;

pub use harness_system::*;
pub use tracing::*;
