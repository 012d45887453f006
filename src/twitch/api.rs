//! Helix streams client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{auth, Credentials, TwitchError, HELIX_STREAMS_URL};
use crate::types::StreamEvent;

/// What the monitors need from Twitch. [`HelixClient`] is the live
/// implementation; tests substitute scripted fakes.
pub trait StreamsApi: Send + Sync {
    /// The active live broadcast for `login`, if any. A rerun or an unknown
    /// login both come back as `None`.
    async fn stream_by_login(&self, login: &str) -> Result<Option<StreamEvent>, TwitchError>;

    /// Drops the cached app token and fetches a fresh one.
    async fn refresh_token(&self) -> Result<(), TwitchError>;
}

#[derive(Debug)]
pub struct HelixClient {
    http: reqwest::Client,
    credentials: Credentials,
    token: RwLock<Option<String>>,
}

impl HelixClient {
    pub fn new(credentials: Credentials) -> Result<HelixClient, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(HelixClient {
            http,
            credentials,
            token: RwLock::new(None),
        })
    }

    async fn bearer(&self) -> Result<String, TwitchError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        let token = auth::fetch_app_token(&self.http, &self.credentials).await?;
        *self.token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

impl StreamsApi for HelixClient {
    async fn stream_by_login(&self, login: &str) -> Result<Option<StreamEvent>, TwitchError> {
        let token = self.bearer().await?;
        let res = self
            .http
            .get(HELIX_STREAMS_URL)
            .query(&[("user_login", login)])
            .header("Client-ID", &self.credentials.client_id)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;

        let status = res.status();
        if status.as_u16() == 401 {
            self.token.write().await.take();
            return Err(TwitchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(TwitchError::Status {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            });
        }

        let page: StreamsResponse = res.json().await?;
        Ok(page
            .data
            .into_iter()
            .find(|s| s.kind == "live")
            .map(StreamEvent::from))
    }

    async fn refresh_token(&self) -> Result<(), TwitchError> {
        self.token.write().await.take();
        self.bearer().await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_login: String,
    user_name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    game_id: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    thumbnail_url: String,
}

impl From<HelixStream> for StreamEvent {
    fn from(s: HelixStream) -> StreamEvent {
        StreamEvent {
            user_login: s.user_login,
            user_name: s.user_name,
            title: s.title,
            game_id: s.game_id,
            game_name: s.game_name,
            viewer_count: s.viewer_count,
            started_at: s.started_at,
            thumbnail_url: s.thumbnail_url,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn helix_payload_deserializes() {
        let raw = r#"{
            "data": [{
                "id": "1",
                "user_id": "2",
                "user_login": "alice",
                "user_name": "Alice",
                "game_id": "100",
                "game_name": "Tetris",
                "type": "live",
                "title": "speedrun",
                "viewer_count": 42,
                "started_at": "2024-03-01T12:00:00Z",
                "thumbnail_url": "https://cdn/live_user_alice-{width}x{height}.jpg"
            }]
        }"#;
        let page: StreamsResponse = serde_json::from_str(raw).unwrap();
        let event = StreamEvent::from(page.data.into_iter().next().unwrap());

        assert_eq!(event.user_login, "alice");
        assert_eq!(event.game_id, "100");
        assert_eq!(event.viewer_count, 42);
        assert!(event.started_at.is_some());
    }

    #[test]
    fn rerun_streams_are_not_live() {
        let raw = r#"{"data": [{"user_login": "alice", "user_name": "Alice", "type": "rerun"}]}"#;
        let page: StreamsResponse = serde_json::from_str(raw).unwrap();

        assert!(!page.data.iter().any(|s| s.kind == "live"));
    }
}
