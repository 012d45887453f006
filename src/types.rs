use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Twitch,
    YouTube,
    TikTok,
}

/// A live broadcast as reported by the Helix streams endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    pub game_id: String,
    pub game_name: String,
    pub viewer_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub thumbnail_url: String,
}

impl StreamEvent {
    pub fn url(&self) -> String {
        format!("https://twitch.tv/{}", self.user_login)
    }
}

/// The newest upload of a YouTube channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEvent {
    pub channel_id: String,
    pub channel_title: String,
    pub video_id: String,
    pub title: String,
}

impl VideoEvent {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// The newest post of a TikTok account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEvent {
    pub username: String,
    pub nickname: String,
    pub post_id: String,
    pub description: String,
}

impl PostEvent {
    pub fn url(&self) -> String {
        format!("https://www.tiktok.com/@{}/video/{}", self.username, self.post_id)
    }
}

/// Handle to a previously delivered notification, kept so the Twitch monitor
/// can edit it in place on a category change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// A member's presence as seen by the gateway glue. Only the fields the role
/// reconciler inspects are carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub guild_id: Option<String>,
    pub user_id: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}
