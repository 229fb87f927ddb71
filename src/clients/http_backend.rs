use crate::clients::{Backend, BackendError};
use crate::framework::PlayerId;
use crate::model::MatchInfo;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const MATCHMAKING_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MATCHMAKING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct JoinResponse {
    #[serde(rename = "ticketId", default)]
    ticket_id: String,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    url: String,
    #[serde(rename = "gameId", default)]
    game_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(rename = "matchId", default)]
    match_id: String,
    server: Option<ServerInfo>,
}

/// [`Backend`] that talks to the gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` is the gateway root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, BackendError> {
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        check_status(operation, resp)
    }

    async fn join_matchmaking(&self, player: PlayerId) -> Result<String, BackendError> {
        let resp = self
            .post_json(
                "matchmaking join",
                "/matchmaking/join",
                json!({ "id": player.to_string() }),
            )
            .await?;
        let join: JoinResponse = resp.json().await.map_err(|e| BackendError::Decode {
            operation: "matchmaking join",
            reason: e.to_string(),
        })?;
        if join.ticket_id.is_empty() {
            return Err(BackendError::EmptyTicket);
        }
        Ok(join.ticket_id)
    }

    /// One status poll. `Ok(None)` means "still searching" or a transient
    /// failure worth retrying on the next poll.
    async fn poll_matchmaking(&self, ticket_id: &str) -> Result<Option<MatchInfo>, BackendError> {
        let resp = match self
            .client
            .get(self.url("/matchmaking/status"))
            .query(&[("ticketId", ticket_id)])
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!(ticket_id, status = resp.status().as_u16(), "Status poll rejected");
                return Ok(None);
            }
            Err(e) => {
                debug!(ticket_id, error = %e, "Status poll failed");
                return Ok(None);
            }
        };

        let status: StatusResponse = match resp.json().await {
            Ok(status) => status,
            Err(e) => {
                debug!(ticket_id, error = %e, "Status poll undecodable");
                return Ok(None);
            }
        };

        match status.status.as_str() {
            "matched" => {
                let server = status.server.unwrap_or(ServerInfo {
                    url: String::new(),
                    game_id: String::new(),
                });
                Ok(Some(MatchInfo {
                    match_id: status.match_id,
                    game_id: server.game_id,
                    server_url: server.url,
                }))
            }
            "cancelled" => Err(BackendError::MatchCancelled),
            _ => Ok(None),
        }
    }
}

fn check_status(
    operation: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    if resp.status() != reqwest::StatusCode::OK {
        return Err(BackendError::Status {
            operation,
            status: resp.status().as_u16(),
        });
    }
    Ok(resp)
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self))]
    async fn login(&self, player: PlayerId) -> Result<(), BackendError> {
        debug!("Sending request");
        self.post_json(
            "login",
            "/login",
            json!({ "id": player.to_string(), "password": "password" }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn matchmaking(&self, player: PlayerId) -> Result<MatchInfo, BackendError> {
        let ticket_id = self.join_matchmaking(player).await?;
        debug!(%ticket_id, "Joined matchmaking");

        let deadline = tokio::time::Instant::now() + MATCHMAKING_TIMEOUT;
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + MATCHMAKING_POLL_INTERVAL,
            MATCHMAKING_POLL_INTERVAL,
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(BackendError::MatchTimeout(ticket_id));
                }
                _ = ticker.tick() => {
                    if let Some(info) = self.poll_matchmaking(&ticket_id).await? {
                        return Ok(info);
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch_store(&self, player: PlayerId) -> Result<(), BackendError> {
        debug!(player, "Sending request");
        let resp = self.client.get(self.url("/store/offers")).send().await?;
        check_status("fetching store", resp)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn store_purchase(&self, player: PlayerId) -> Result<(), BackendError> {
        let offer_id: u32 = rand::thread_rng().gen();
        debug!(offer_id, "Sending request");
        self.post_json(
            "store purchase",
            "/store/purchase",
            json!({ "id": player.to_string(), "offer_id": offer_id.to_string() }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new("http://gateway:8080/");
        assert_eq!(backend.base_url(), "http://gateway:8080");
        assert_eq!(backend.url("/login"), "http://gateway:8080/login");
    }

    #[test]
    fn status_response_decodes_matched_payload() {
        let raw = r#"{"status":"matched","matchId":"m-1","server":{"url":"ws://gs:9000/ws","gameId":"g-7"}}"#;
        let status: StatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(status.status, "matched");
        assert_eq!(status.match_id, "m-1");
        let server = status.server.unwrap();
        assert_eq!(server.url, "ws://gs:9000/ws");
        assert_eq!(server.game_id, "g-7");
    }

    #[test]
    fn searching_status_has_no_server() {
        let status: StatusResponse = serde_json::from_str(r#"{"status":"searching"}"#).unwrap();
        assert!(status.server.is_none());
        assert!(status.match_id.is_empty());
    }
}
