//! Player pool and scenario compositor engine.
//!
//! This module holds the load-generation core: a population of long-lived
//! players, each cycling through idle and busy, and a compositor that converts
//! per-player rates into dispatches.
//!
//! # Main Components
//!
//! - [`Pool`] - Keeps the population at target and hands scenarios to idle players
//! - [`Compositor`] - Accumulator-based rate scheduler driving a [`ScenarioDispatcher`]
//! - [`Scenario`] - Closed set of workflows with probabilistic follow-ups
//! - [`PlayerRegistry`] - Live players by id, each with its own cancellation handle
//! - [`EventSink`] - Where the engine reports what it does
//!
//! # Testing
//!
//! See [`mock`] module for an in-memory backend that drives players without a gateway.

pub mod compositor;
pub mod error;
pub mod events;
mod idle_queue;
pub mod mock;
pub mod player;
pub mod pool;
pub mod registry;
pub mod scenario;

pub use compositor::*;
pub use error::*;
pub use events::*;
pub use player::{PlayerId, PlayerSession};
pub use pool::*;
pub use registry::*;
pub use scenario::*;
