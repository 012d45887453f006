//! TikTok post listings via web scraping.
//!
//! There is no official API here. The profile page embeds its state as JSON
//! in a script tag whose id has changed over time, and the shape of that
//! state drifts too, so both the tag and the data paths are candidate lists
//! probed in order. When the page yields nothing, an unofficial JSON endpoint
//! is tried. When that fails as well the account simply has no data this
//! cycle; cached monitor state is never touched on the strength of a failed
//! scrape.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::json::pluck;
use crate::types::PostEvent;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15";

/// Script-tag ids that have carried the page state, newest first.
const EMBED_TAGS: [&str; 3] = [
    "__UNIVERSAL_DATA_FOR_REHYDRATION__",
    "SIGI_STATE",
    "__NEXT_DATA__",
];

#[derive(Debug, Error)]
pub enum TikTokError {
    #[error("tiktok user not found")]
    NotFound,
    #[error("tiktok returned {status}")]
    Status { status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub trait PostsApi: Send + Sync {
    /// The account's newest post, `Ok(None)` when no strategy yielded data.
    async fn latest_post(&self, username: &str) -> Result<Option<PostEvent>, TikTokError>;
}

#[derive(Debug, Clone, Default)]
pub struct TikTokClient {
    http: reqwest::Client,
}

impl TikTokClient {
    pub fn new() -> Result<TikTokClient, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(TikTokClient { http })
    }

    async fn fetch_profile_html(&self, username: &str) -> Result<String, TikTokError> {
        let res = self
            .http
            .get(format!("https://www.tiktok.com/@{username}"))
            .timeout(Duration::from_secs(15))
            .header("User-Agent", BROWSER_USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = res.status();
        if status.as_u16() == 404 {
            return Err(TikTokError::NotFound);
        }
        if !status.is_success() {
            return Err(TikTokError::Status {
                status: status.as_u16(),
            });
        }
        Ok(res.text().await?)
    }

    async fn latest_via_web(&self, username: &str) -> Result<Option<PostEvent>, TikTokError> {
        let html = self.fetch_profile_html(username).await?;
        Ok(latest_post_from_html(&html, username))
    }

    async fn latest_via_api(&self, username: &str) -> Result<Option<PostEvent>, TikTokError> {
        let detail: Value = self
            .api_get(format!(
                "https://www.tiktok.com/api/user/detail/?uniqueId={username}"
            ), username)
            .await?;

        let Some(sec_uid) = pluck(&detail, ".userInfo.user.secUid").and_then(Value::as_str) else {
            debug!("no secUid for @{username} from the detail endpoint");
            return Ok(None);
        };
        let nickname = pluck(&detail, ".userInfo.user.nickname")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_owned();

        let items: Value = self
            .api_get(format!(
                "https://www.tiktok.com/api/post/item_list/?secUid={sec_uid}&count=10"
            ), username)
            .await?;

        let Some(item) = pluck(&items, ".itemList[0]") else {
            return Ok(None);
        };
        Ok(post_from_item(item, username, &nickname))
    }

    async fn api_get(&self, url: String, username: &str) -> Result<Value, TikTokError> {
        let res = self
            .http
            .get(url)
            .timeout(Duration::from_secs(10))
            .header("User-Agent", MOBILE_USER_AGENT)
            .header("Accept", "application/json")
            .header("Referer", format!("https://www.tiktok.com/@{username}"))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(TikTokError::Status {
                status: status.as_u16(),
            });
        }
        Ok(res.json().await?)
    }

    /// Lightweight existence check used during account-add flows. Never
    /// errors to the caller: any failure reads as "not valid".
    pub async fn validate_username(&self, username: &str) -> bool {
        match self.fetch_profile_html(username).await {
            Ok(html) => EMBED_TAGS.iter().any(|tag| html.contains(tag)),
            Err(_) => false,
        }
    }
}

impl PostsApi for TikTokClient {
    async fn latest_post(&self, username: &str) -> Result<Option<PostEvent>, TikTokError> {
        match self.latest_via_web(username).await {
            Ok(Some(post)) => return Ok(Some(post)),
            Ok(None) => debug!("profile page for @{username} had no parseable posts"),
            Err(err) => debug!("profile page fetch for @{username} failed: {err}"),
        }
        self.latest_via_api(username).await
    }
}

fn latest_post_from_html(html: &str, username: &str) -> Option<PostEvent> {
    let state = embedded_state(html)?;
    latest_post_from_state(&state, username)
}

/// Pulls `<script id="…" type="application/json">…</script>` content for the
/// first candidate tag present on the page.
fn embedded_state(html: &str) -> Option<Value> {
    for tag in EMBED_TAGS {
        let Some(at) = html.find(&format!("id=\"{tag}\"")) else {
            continue;
        };
        let tail = &html[at..];
        let Some(start) = tail.find('>') else { continue };
        let body = &tail[start + 1..];
        let Some(end) = body.find("</script>") else {
            continue;
        };
        if let Ok(state) = serde_json::from_str(&body[..end]) {
            return Some(state);
        }
    }
    None
}

fn latest_post_from_state(state: &Value, username: &str) -> Option<PostEvent> {
    let user_paths = [
        ".__DEFAULT_SCOPE__[webapp.user-detail]".to_owned(),
        format!(".UserModule.users[{username}]"),
        ".props.pageProps.userInfo".to_owned(),
    ];
    let user_data = user_paths.iter().find_map(|path| pluck(state, path));

    let posts = candidate_posts(state, user_data);
    let item = posts.first()?;

    let nickname = user_data
        .and_then(|u| {
            [".userInfo.user.nickname", ".user.nickname", ".nickname"]
                .iter()
                .find_map(|path| pluck(u, path))
        })
        .and_then(Value::as_str)
        .unwrap_or(username);

    post_from_item(item, username, nickname)
}

/// Known homes of the post list, probed in order. `ItemModule` is a map of
/// post id -> post with ascending ids, so its newest entry is the last one.
fn candidate_posts<'a>(state: &'a Value, user_data: Option<&'a Value>) -> Vec<&'a Value> {
    if let Some(user) = user_data {
        for path in [".itemList", ".items"] {
            if let Some(arr) = pluck(user, path).and_then(Value::as_array) {
                if !arr.is_empty() {
                    return arr.iter().collect();
                }
            }
        }
    }
    if let Some(map) = pluck(state, ".ItemModule").and_then(Value::as_object) {
        if !map.is_empty() {
            return map.values().rev().collect();
        }
    }
    if let Some(arr) = pluck(state, ".props.pageProps.items").and_then(Value::as_array) {
        if !arr.is_empty() {
            return arr.iter().collect();
        }
    }
    Vec::new()
}

fn post_from_item(item: &Value, username: &str, nickname: &str) -> Option<PostEvent> {
    let post_id = [".id", ".itemId", ".video.id"]
        .iter()
        .find_map(|path| pluck(item, path))
        .and_then(stringish)?;
    let description = [".desc", ".description", ".title"]
        .iter()
        .find_map(|path| pluck(item, path))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_owned();

    Some(PostEvent {
        username: username.to_owned(),
        nickname: nickname.to_owned(),
        post_id,
        description,
    })
}

// Post ids show up both as strings and as bare numbers.
fn stringish(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn page(tag: &str, state: &str) -> String {
        format!(
            "<html><head></head><body><script id=\"{tag}\" type=\"application/json\">{state}</script></body></html>"
        )
    }

    #[test]
    fn universal_data_shape() {
        let state = r#"{
            "__DEFAULT_SCOPE__": {
                "webapp.user-detail": {
                    "userInfo": {"user": {"uniqueId": "bob", "nickname": "Bob"}},
                    "itemList": [
                        {"id": "333", "desc": "newest"},
                        {"id": "222", "desc": "older"}
                    ]
                }
            }
        }"#;
        let html = page("__UNIVERSAL_DATA_FOR_REHYDRATION__", state);
        let post = latest_post_from_html(&html, "bob").unwrap();

        assert_eq!(post.post_id, "333");
        assert_eq!(post.description, "newest");
        assert_eq!(post.nickname, "Bob");
        assert_eq!(post.url(), "https://www.tiktok.com/@bob/video/333");
    }

    #[test]
    fn sigi_state_shape() {
        let state = r#"{
            "UserModule": {"users": {"bob": {"nickname": "Bob", "uniqueId": "bob"}}},
            "ItemModule": {
                "111": {"id": "111", "desc": "older"},
                "222": {"id": "222", "desc": "newest"}
            }
        }"#;
        let html = page("SIGI_STATE", state);
        let post = latest_post_from_html(&html, "bob").unwrap();

        assert_eq!(post.post_id, "222");
        assert_eq!(post.nickname, "Bob");
    }

    #[test]
    fn next_data_shape() {
        let state = r#"{
            "props": {
                "pageProps": {
                    "userInfo": {"user": {"nickname": "Bob"}},
                    "items": [{"itemId": 444, "title": "from next"}]
                }
            }
        }"#;
        let html = page("__NEXT_DATA__", state);
        let post = latest_post_from_html(&html, "bob").unwrap();

        assert_eq!(post.post_id, "444");
        assert_eq!(post.description, "from next");
    }

    #[test]
    fn unknown_page_yields_nothing() {
        assert!(latest_post_from_html("<html>captcha wall</html>", "bob").is_none());
        let html = page("SIGI_STATE", "{not valid json");
        assert!(latest_post_from_html(&html, "bob").is_none());
        let html = page("SIGI_STATE", r#"{"UserModule": {"users": {}}}"#);
        assert!(latest_post_from_html(&html, "bob").is_none());
    }

    #[test]
    fn post_without_any_id_is_rejected() {
        let item = serde_json::json!({"desc": "no id here"});
        assert!(post_from_item(&item, "bob", "Bob").is_none());
    }
}
