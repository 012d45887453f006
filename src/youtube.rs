//! YouTube upload listings.
//!
//! Two interchangeable read paths: the Data API when a key is configured,
//! otherwise the public channel Atom feed. Channel-id resolution accepts the
//! raw `UC…` id, channel URLs, and `@handles`; handles resolve through the
//! Data API search endpoint, falling back to plucking the id out of the
//! channel page HTML.

use std::io::Cursor;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::VideoEvent;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";

#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("youtube returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unparseable feed: {0}")]
    Feed(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub trait UploadsApi: Send + Sync {
    /// The channel's newest video, if the channel exists and has any.
    async fn latest_video(&self, channel_id: &str) -> Result<Option<VideoEvent>, YouTubeError>;
}

#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>) -> Result<YouTubeClient, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(YouTubeClient { http, api_key })
    }

    async fn latest_via_api(
        &self,
        channel_id: &str,
        key: &str,
    ) -> Result<Option<VideoEvent>, YouTubeError> {
        let res = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("order", "date"),
                ("maxResults", "1"),
                ("type", "video"),
                ("key", key),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(YouTubeError::Status {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            });
        }

        let page: SearchResponse = res.json().await?;
        Ok(page.items.into_iter().next().and_then(|item| {
            let video_id = item.id.video_id?;
            Some(VideoEvent {
                channel_id: channel_id.to_owned(),
                channel_title: item.snippet.channel_title,
                video_id,
                title: item.snippet.title,
            })
        }))
    }

    async fn latest_via_feed(&self, channel_id: &str) -> Result<Option<VideoEvent>, YouTubeError> {
        let res = self
            .http
            .get(FEED_URL)
            .query(&[("channel_id", channel_id)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(YouTubeError::Status {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            });
        }

        let bytes = res.bytes().await?;
        let feed = feed_rs::parser::parse(Cursor::new(bytes))
            .map_err(|e| YouTubeError::Feed(e.to_string()))?;

        let channel_title = feed
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| channel_id.to_owned());
        Ok(feed.entries.into_iter().next().map(|entry| VideoEvent {
            channel_id: channel_id.to_owned(),
            channel_title,
            video_id: video_id_from_entry_id(&entry.id),
            title: entry.title.map(|t| t.content).unwrap_or_default(),
        }))
    }

    /// Turns a `UC…` id, channel URL, or `@handle` into a channel id.
    /// `Ok(None)` means the input could not be resolved, not a hard failure.
    pub async fn resolve_channel_id(&self, input: &str) -> Result<Option<String>, YouTubeError> {
        let input = input.trim();
        if is_channel_id(input) {
            return Ok(Some(input.to_owned()));
        }

        if let Some(id) = channel_id_from_url(input) {
            return Ok(Some(id));
        }

        let Some(handle) = handle_from_input(input) else {
            return Ok(None);
        };

        if let Some(key) = self.api_key.clone() {
            if let Some(id) = self.search_channel(&handle, &key).await? {
                return Ok(Some(id));
            }
        }

        // No key (or the search came up empty): scrape the channel page.
        let res = self
            .http
            .get(format!("https://www.youtube.com/{handle}"))
            .send()
            .await?;
        if !res.status().is_success() {
            debug!("channel page for {handle} returned {}", res.status());
            return Ok(None);
        }
        let html = res.text().await?;
        Ok(channel_id_from_html(&html))
    }

    async fn search_channel(&self, handle: &str, key: &str) -> Result<Option<String>, YouTubeError> {
        let res = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("q", handle),
                ("type", "channel"),
                ("maxResults", "1"),
                ("key", key),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(YouTubeError::Status {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            });
        }

        let page: SearchResponse = res.json().await?;
        Ok(page.items.into_iter().next().and_then(|i| i.id.channel_id))
    }
}

impl UploadsApi for YouTubeClient {
    async fn latest_video(&self, channel_id: &str) -> Result<Option<VideoEvent>, YouTubeError> {
        match self.api_key.clone() {
            Some(key) => self.latest_via_api(channel_id, &key).await,
            None => self.latest_via_feed(channel_id).await,
        }
    }
}

pub fn is_channel_id(input: &str) -> bool {
    input.len() == 24
        && input.starts_with("UC")
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Feed entry ids look like `yt:video:dQw4w9WgXcQ`.
fn video_id_from_entry_id(entry_id: &str) -> String {
    entry_id.rsplit(':').next().unwrap_or(entry_id).to_owned()
}

fn channel_id_from_url(input: &str) -> Option<String> {
    let idx = input.find("youtube.com/channel/")?;
    let tail = &input[idx + "youtube.com/channel/".len()..];
    let id: String = tail
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    is_channel_id(&id).then_some(id)
}

/// Normalizes handle-ish inputs (`@name`, `youtube.com/@name`,
/// `youtube.com/c/name`, `youtube.com/user/name`, bare `name`) to `@name`.
fn handle_from_input(input: &str) -> Option<String> {
    if input.starts_with('@') {
        return Some(input.to_owned());
    }
    if let Some(idx) = input.find("youtube.com/") {
        let tail = &input[idx + "youtube.com/".len()..];
        let name = tail
            .trim_start_matches("c/")
            .trim_start_matches("user/")
            .trim_start_matches('@');
        let name: String = name
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
            .collect();
        if name.is_empty() {
            return None;
        }
        return Some(format!("@{name}"));
    }
    if input.is_empty() || input.contains('/') {
        return None;
    }
    Some(format!("@{input}"))
}

/// Hunts for `"channelId":"UC…"` (or `channelId=UC…`) in channel page HTML.
fn channel_id_from_html(html: &str) -> Option<String> {
    let mut rest = html;
    while let Some(pos) = rest.find("channelId") {
        let tail = &rest[pos..];
        if let Some(uc) = tail.find("UC") {
            let id: String = tail[uc..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            if is_channel_id(&id) {
                return Some(id);
            }
        }
        rest = &rest[pos + "channelId".len()..];
    }
    None
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[test]
    fn channel_id_shape() {
        assert!(is_channel_id("UCX6OQ3DkcsbYNE6H8uQQuVA"));
        assert!(!is_channel_id("UCX6OQ3Dkcsb"));
        assert!(!is_channel_id("ACX6OQ3DkcsbYNE6H8uQQuVA"));
        assert!(!is_channel_id("UCX6OQ3DkcsbYNE6H8uQQuV!"));
    }

    #[rstest]
    #[case("UCX6OQ3DkcsbYNE6H8uQQuVA", Some("UCX6OQ3DkcsbYNE6H8uQQuVA"))]
    #[case("https://www.youtube.com/channel/UCX6OQ3DkcsbYNE6H8uQQuVA", Some("UCX6OQ3DkcsbYNE6H8uQQuVA"))]
    #[case("https://www.youtube.com/channel/UCX6OQ3DkcsbYNE6H8uQQuVA?sub=1", Some("UCX6OQ3DkcsbYNE6H8uQQuVA"))]
    #[case("https://www.youtube.com/channel/short", None)]
    fn direct_channel_ids(#[case] input: &str, #[case] expected: Option<&str>) {
        let direct = if is_channel_id(input.trim()) {
            Some(input.trim().to_owned())
        } else {
            channel_id_from_url(input)
        };
        assert_eq!(direct.as_deref(), expected);
    }

    #[rstest]
    #[case("@MrBeast", Some("@MrBeast"))]
    #[case("https://youtube.com/@LinusTechTips", Some("@LinusTechTips"))]
    #[case("https://www.youtube.com/c/SomeName", Some("@SomeName"))]
    #[case("https://www.youtube.com/user/OldName", Some("@OldName"))]
    #[case("SomeName", Some("@SomeName"))]
    #[case("", None)]
    fn handle_inputs(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(handle_from_input(input).as_deref(), expected);
    }

    #[test]
    fn html_pluck_finds_channel_id() {
        let html = r#"<script>var x = {"channelId":"UCX6OQ3DkcsbYNE6H8uQQuVA","title":"y"}</script>"#;
        assert_eq!(
            channel_id_from_html(html).as_deref(),
            Some("UCX6OQ3DkcsbYNE6H8uQQuVA")
        );
        assert_eq!(channel_id_from_html("<html>nothing</html>"), None);
    }

    #[test]
    fn feed_entry_id_is_stripped() {
        assert_eq!(video_id_from_entry_id("yt:video:dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(video_id_from_entry_id("plainid"), "plainid");
    }
}
