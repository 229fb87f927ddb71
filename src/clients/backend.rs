use crate::clients::BackendError;
use crate::framework::PlayerId;
use crate::model::MatchInfo;
use async_trait::async_trait;

/// The calls a scenario can make against the backend-under-test.
///
/// Scenarios only classify the result (ok, error, cancelled); they never look
/// inside it, except for [`MatchInfo`] which is stored on the player session.
///
/// Implementations: [`HttpBackend`](super::HttpBackend) for real runs and
/// [`MockBackend`](crate::framework::mock::MockBackend) for tests.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn login(&self, player: PlayerId) -> Result<(), BackendError>;

    async fn matchmaking(&self, player: PlayerId) -> Result<MatchInfo, BackendError>;

    async fn fetch_store(&self, player: PlayerId) -> Result<(), BackendError>;

    async fn store_purchase(&self, player: PlayerId) -> Result<(), BackendError>;
}
