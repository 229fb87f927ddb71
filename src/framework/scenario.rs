//! # Scenarios
//!
//! A [`Scenario`] is a named, stateless unit of behavior a player executes once
//! per assignment. The set of scenarios is closed: adding a new behavior means
//! adding a variant here, which forces every `match` (name, follow-ups, run) to
//! handle it.
//!
//! Per-invocation data (player id, match info) comes from the
//! [`PlayerSession`] passed to [`Scenario::run`]; everything shared comes from
//! the [`ScenarioContext`].

use crate::clients::Backend;
use crate::framework::error::{ScenarioError, UnknownScenario};
use crate::framework::events::EventSink;
use crate::framework::player::PlayerSession;
use crate::framework::registry::PlayerRegistry;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Chance that a store visit ends in a purchase.
pub const DEFAULT_PURCHASE_CHANCE: f64 = 0.1;

/// Shared dependencies handed to every scenario run.
///
/// Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct ScenarioContext {
    pub backend: Arc<dyn Backend>,
    pub events: Arc<dyn EventSink>,
    pub registry: PlayerRegistry,
}

impl ScenarioContext {
    pub fn new(backend: Arc<dyn Backend>, events: Arc<dyn EventSink>) -> Self {
        Self {
            backend,
            events,
            registry: PlayerRegistry::default(),
        }
    }
}

/// A scenario that may run after another one succeeds, on the same player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowUp {
    pub scenario: Scenario,
    pub chance: f64,
}

impl FollowUp {
    /// Decide whether this follow-up fires for one successful run.
    pub fn roll(&self, rng: &mut impl Rng) -> bool {
        if self.chance >= 1.0 {
            return true;
        }
        if self.chance <= 0.0 {
            return false;
        }
        rng.gen::<f64>() < self.chance
    }
}

/// The behaviors a player can execute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scenario {
    /// Mandatory first scenario of every player.
    Login,
    /// Join matchmaking and wait for a match.
    Matchmaking,
    /// Browse the store; sometimes followed by a purchase.
    FetchStore { purchase_chance: f64 },
    StorePurchase,
    /// Terminate the running player's lifeline.
    Logout,
}

impl Scenario {
    pub fn fetch_store() -> Self {
        Scenario::FetchStore {
            purchase_chance: DEFAULT_PURCHASE_CHANCE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Login => "login",
            Scenario::Matchmaking => "matchmaking",
            Scenario::FetchStore { .. } => "fetch_store",
            Scenario::StorePurchase => "store_purchase",
            Scenario::Logout => "logout",
        }
    }

    pub fn follow_ups(&self) -> Vec<FollowUp> {
        match self {
            Scenario::FetchStore { purchase_chance } => vec![FollowUp {
                scenario: Scenario::StorePurchase,
                chance: *purchase_chance,
            }],
            _ => Vec::new(),
        }
    }

    /// Execute this scenario on behalf of `player`.
    ///
    /// Cancellation is not observed here; the player lifeline races this
    /// future against its own token.
    pub async fn run(
        &self,
        player: &mut PlayerSession,
        ctx: &ScenarioContext,
    ) -> Result<(), ScenarioError> {
        let player_id = player.id();
        debug!(player_id, scenario = self.name(), "Running scenario");

        match self {
            Scenario::Login => ctx.backend.login(player_id).await?,
            Scenario::Matchmaking => {
                let info = ctx.backend.matchmaking(player_id).await?;
                debug!(player_id, match_id = %info.match_id, "Matched");
                player.set_match_info(info);
            }
            Scenario::FetchStore { .. } => ctx.backend.fetch_store(player_id).await?,
            Scenario::StorePurchase => ctx.backend.store_purchase(player_id).await?,
            Scenario::Logout => {
                let handle = ctx
                    .registry
                    .get(player_id)
                    .ok_or(ScenarioError::PlayerGone(player_id))?;
                handle.terminate();
            }
        }
        Ok(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "login" => Ok(Scenario::Login),
            "matchmaking" => Ok(Scenario::Matchmaking),
            "fetch_store" => Ok(Scenario::fetch_store()),
            "store_purchase" => Ok(Scenario::StorePurchase),
            "logout" => Ok(Scenario::Logout),
            other => Err(UnknownScenario(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn names_parse_back() {
        for scenario in [
            Scenario::Login,
            Scenario::Matchmaking,
            Scenario::fetch_store(),
            Scenario::StorePurchase,
            Scenario::Logout,
        ] {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert_eq!(
            "dance".parse::<Scenario>(),
            Err(UnknownScenario("dance".to_string()))
        );
    }

    #[test]
    fn only_fetch_store_declares_follow_ups() {
        let follow_ups = Scenario::fetch_store().follow_ups();
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].scenario, Scenario::StorePurchase);
        assert_eq!(follow_ups[0].chance, DEFAULT_PURCHASE_CHANCE);

        assert!(Scenario::Login.follow_ups().is_empty());
        assert!(Scenario::Matchmaking.follow_ups().is_empty());
        assert!(Scenario::Logout.follow_ups().is_empty());
    }

    #[test]
    fn follow_up_roll_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let always = FollowUp {
            scenario: Scenario::StorePurchase,
            chance: 1.0,
        };
        let never = FollowUp {
            scenario: Scenario::StorePurchase,
            chance: 0.0,
        };
        for _ in 0..1000 {
            assert!(always.roll(&mut rng));
            assert!(!never.roll(&mut rng));
        }
    }

    #[test]
    fn follow_up_roll_tracks_chance() {
        let mut rng = StdRng::seed_from_u64(42);
        let sometimes = FollowUp {
            scenario: Scenario::StorePurchase,
            chance: 0.25,
        };
        let hits = (0..20_000).filter(|_| sometimes.roll(&mut rng)).count();
        let ratio = hits as f64 / 20_000.0;
        assert!((ratio - 0.25).abs() < 0.02, "ratio was {ratio}");
    }
}
