//! # Mock Backend & Testing Guide
//!
//! [`MockBackend`] implements [`Backend`] entirely in memory so the engine can
//! be exercised without a gateway. It records every call per player, can delay
//! or fail chosen operations, and tracks how many calls each player has in
//! flight at once.
//!
//! | Need | Builder |
//! |------|---------|
//! | Login always fails | [`MockBackend::fail_login`] |
//! | One scenario fails | [`MockBackend::fail_scenario`] |
//! | Slow scenario | [`MockBackend::with_latency`] |
//!
//! ```rust
//! use player_harness::framework::mock::MockBackend;
//! use std::time::Duration;
//!
//! let backend = MockBackend::new()
//!     .with_latency("matchmaking", Duration::from_secs(5))
//!     .fail_scenario("store_purchase");
//! assert_eq!(backend.total_calls(), 0);
//! ```

use crate::clients::{Backend, BackendError};
use crate::framework::player::PlayerId;
use crate::model::MatchInfo;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CallLog {
    calls: Vec<(PlayerId, &'static str)>,
    in_flight: HashMap<PlayerId, usize>,
    max_in_flight: usize,
}

/// In-memory [`Backend`] with scripted latency and failures.
#[derive(Clone, Default)]
pub struct MockBackend {
    latency: HashMap<&'static str, Duration>,
    failing: HashSet<&'static str>,
    log: Arc<Mutex<CallLog>>,
}

/// Decrements the per-player in-flight count even when the call is dropped
/// mid-flight by a cancelled lifeline.
struct InFlight {
    player: PlayerId,
    log: Arc<Mutex<CallLog>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(n) = log.in_flight.get_mut(&self.player) {
            *n -= 1;
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_login(self) -> Self {
        self.fail_scenario("login")
    }

    /// Make every call of operation `name` fail (`login`, `matchmaking`,
    /// `fetch_store`, `store_purchase`).
    pub fn fail_scenario(mut self, name: &'static str) -> Self {
        self.failing.insert(name);
        self
    }

    pub fn with_latency(mut self, name: &'static str, latency: Duration) -> Self {
        self.latency.insert(name, latency);
        self
    }

    /// Operations called on behalf of `player`, in call order.
    pub fn calls_for(&self, player: PlayerId) -> Vec<&'static str> {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.calls
            .iter()
            .filter(|(id, _)| *id == player)
            .map(|(_, name)| *name)
            .collect()
    }

    /// Number of calls of operation `name` across all players.
    pub fn calls(&self, name: &str) -> usize {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.calls.iter().filter(|(_, n)| *n == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).calls.len()
    }

    /// Highest number of simultaneous calls observed for any single player.
    pub fn max_in_flight_per_player(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).max_in_flight
    }

    async fn call(&self, player: PlayerId, name: &'static str) -> Result<(), BackendError> {
        let _in_flight = {
            let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
            log.calls.push((player, name));
            let n = log.in_flight.entry(player).or_insert(0);
            *n += 1;
            let current = *n;
            log.max_in_flight = log.max_in_flight.max(current);
            InFlight {
                player,
                log: self.log.clone(),
            }
        };

        if let Some(latency) = self.latency.get(name) {
            tokio::time::sleep(*latency).await;
        }
        if self.failing.contains(name) {
            return Err(BackendError::Rejected(format!("{name} for player {player}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn login(&self, player: PlayerId) -> Result<(), BackendError> {
        self.call(player, "login").await
    }

    async fn matchmaking(&self, player: PlayerId) -> Result<MatchInfo, BackendError> {
        self.call(player, "matchmaking").await?;
        Ok(MatchInfo {
            match_id: format!("match_{player}"),
            game_id: format!("game_{player}"),
            server_url: "ws://localhost:9000/ws".to_string(),
        })
    }

    async fn fetch_store(&self, player: PlayerId) -> Result<(), BackendError> {
        self.call(player, "fetch_store").await
    }

    async fn store_purchase(&self, player: PlayerId) -> Result<(), BackendError> {
        self.call(player, "store_purchase").await
    }
}
