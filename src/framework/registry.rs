//! Registry of live players, keyed by id.
//!
//! Written once when a player is created and once when its lifeline exits.
//! Read by the logout path to reach one specific player.

use crate::framework::player::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Capability to terminate one player.
///
/// Holds a clone of the player's cancellation token, not the lifeline itself:
/// the player's task still owns its own lifetime.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: PlayerId,
    token: CancellationToken,
}

impl PlayerHandle {
    pub(crate) fn new(id: PlayerId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Cancel the player's lifeline. Idempotent.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: Arc<RwLock<HashMap<PlayerId, PlayerHandle>>>,
}

impl PlayerRegistry {
    pub(crate) fn insert(&self, handle: PlayerHandle) {
        // A poisoned lock only means another lifeline panicked mid-insert;
        // the map itself is still usable.
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        players.insert(handle.id, handle);
    }

    pub(crate) fn remove(&self, id: PlayerId) -> Option<PlayerHandle> {
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<PlayerHandle> {
        let players = self.players.read().unwrap_or_else(|e| e.into_inner());
        players.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.players.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let players = self.players.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<_> = players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
