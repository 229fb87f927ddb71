use serde::{Deserialize, Serialize};

/// Where a matched player should connect to play.
///
/// Returned by [`Backend::matchmaking`](crate::clients::Backend::matchmaking)
/// and kept on the player's session until the next match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: String,
    pub game_id: String,
    pub server_url: String,
}
