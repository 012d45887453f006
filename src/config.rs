//! Durable per-guild configuration.
//!
//! One YAML file holds every guild's record plus the poll cadences. The store
//! is loaded once at startup, mutated by the command layer, and persisted
//! after each mutation. Monitors only ever read snapshots of it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_twitch_message() -> String {
    "🔴 {username} is now live on Twitch!\n**{title}**\nPlaying: {game}".to_owned()
}

fn default_youtube_message() -> String {
    "📺 {channel} just uploaded a new video!\n**{title}**".to_owned()
}

fn default_tiktok_message() -> String {
    "🎵 {username} just posted on TikTok!\n**{description}**".to_owned()
}

pub trait Normalize {
    fn normalize(&mut self);
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TwitchSection {
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default = "default_twitch_message")]
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub custom_messages: IndexMap<String, String>,
    /// Discord user id -> twitch login, established via /linkaccount.
    #[serde(default)]
    pub linked_accounts: IndexMap<String, String>,
}

impl Default for TwitchSection {
    fn default() -> Self {
        TwitchSection {
            usernames: Vec::new(),
            message: default_twitch_message(),
            custom_messages: IndexMap::new(),
            linked_accounts: IndexMap::new(),
        }
    }
}

impl Normalize for TwitchSection {
    fn normalize(&mut self) {
        for name in &mut self.usernames {
            *name = normalize_login(name);
        }
        dedupe(&mut self.usernames);
        self.custom_messages = std::mem::take(&mut self.custom_messages)
            .into_iter()
            .map(|(k, v)| (normalize_login(&k), v))
            .collect();
        for login in self.linked_accounts.values_mut() {
            *login = normalize_login(login);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct YouTubeSection {
    #[serde(default)]
    pub channel_ids: Vec<String>,
    #[serde(default = "default_youtube_message")]
    #[validate(length(min = 1))]
    pub message: String,
}

impl Default for YouTubeSection {
    fn default() -> Self {
        YouTubeSection {
            channel_ids: Vec::new(),
            message: default_youtube_message(),
        }
    }
}

impl Normalize for YouTubeSection {
    fn normalize(&mut self) {
        for id in &mut self.channel_ids {
            *id = id.trim().to_owned();
        }
        dedupe(&mut self.channel_ids);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TikTokSection {
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default = "default_tiktok_message")]
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub custom_messages: IndexMap<String, String>,
}

impl Default for TikTokSection {
    fn default() -> Self {
        TikTokSection {
            usernames: Vec::new(),
            message: default_tiktok_message(),
            custom_messages: IndexMap::new(),
        }
    }
}

impl Normalize for TikTokSection {
    fn normalize(&mut self) {
        for name in &mut self.usernames {
            *name = normalize_login(name);
        }
        dedupe(&mut self.usernames);
        self.custom_messages = std::mem::take(&mut self.custom_messages)
            .into_iter()
            .map(|(k, v)| (normalize_login(&k), v))
            .collect();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GuildConfig {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub live_role_id: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub twitch: TwitchSection,
    #[serde(default)]
    #[validate(nested)]
    pub youtube: YouTubeSection,
    #[serde(default)]
    #[validate(nested)]
    pub tiktok: TikTokSection,
}

impl Normalize for GuildConfig {
    fn normalize(&mut self) {
        self.twitch.normalize();
        self.youtube.normalize();
        self.tiktok.normalize();
    }
}

impl GuildConfig {
    pub fn set_channel(&mut self, channel_id: &str) {
        self.channel_id = Some(channel_id.to_owned());
    }

    pub fn set_live_role(&mut self, role_id: Option<String>) {
        self.live_role_id = role_id;
    }

    /// Returns false if the streamer was already monitored.
    pub fn add_streamer(&mut self, username: &str) -> bool {
        let username = normalize_login(username);
        if self.twitch.usernames.contains(&username) {
            return false;
        }
        self.twitch.usernames.push(username);
        true
    }

    pub fn remove_streamer(&mut self, username: &str) -> bool {
        let username = normalize_login(username);
        let before = self.twitch.usernames.len();
        self.twitch.usernames.retain(|u| *u != username);
        self.twitch.custom_messages.shift_remove(&username);
        before != self.twitch.usernames.len()
    }

    pub fn add_youtube_channel(&mut self, channel_id: &str) -> bool {
        let channel_id = channel_id.trim().to_owned();
        if self.youtube.channel_ids.contains(&channel_id) {
            return false;
        }
        self.youtube.channel_ids.push(channel_id);
        true
    }

    pub fn remove_youtube_channel(&mut self, channel_id: &str) -> bool {
        let channel_id = channel_id.trim();
        let before = self.youtube.channel_ids.len();
        self.youtube.channel_ids.retain(|c| c != channel_id);
        before != self.youtube.channel_ids.len()
    }

    pub fn add_tiktok(&mut self, username: &str) -> bool {
        let username = normalize_login(username);
        if self.tiktok.usernames.contains(&username) {
            return false;
        }
        self.tiktok.usernames.push(username);
        true
    }

    pub fn remove_tiktok(&mut self, username: &str) -> bool {
        let username = normalize_login(username);
        let before = self.tiktok.usernames.len();
        self.tiktok.usernames.retain(|u| *u != username);
        self.tiktok.custom_messages.shift_remove(&username);
        before != self.tiktok.usernames.len()
    }

    pub fn set_twitch_custom_message(&mut self, username: &str, template: &str) {
        self.twitch
            .custom_messages
            .insert(normalize_login(username), template.to_owned());
    }

    pub fn clear_twitch_custom_message(&mut self, username: &str) -> bool {
        self.twitch
            .custom_messages
            .shift_remove(&normalize_login(username))
            .is_some()
    }

    pub fn set_tiktok_custom_message(&mut self, username: &str, template: &str) {
        self.tiktok
            .custom_messages
            .insert(normalize_login(username), template.to_owned());
    }

    pub fn clear_tiktok_custom_message(&mut self, username: &str) -> bool {
        self.tiktok
            .custom_messages
            .shift_remove(&normalize_login(username))
            .is_some()
    }

    pub fn link_account(&mut self, user_id: &str, twitch_login: &str) -> Option<String> {
        self.twitch
            .linked_accounts
            .insert(user_id.to_owned(), normalize_login(twitch_login))
    }

    pub fn unlink_account(&mut self, user_id: &str) -> bool {
        self.twitch.linked_accounts.shift_remove(user_id).is_some()
    }

    pub fn linked_twitch(&self, user_id: &str) -> Option<&str> {
        self.twitch.linked_accounts.get(user_id).map(String::as_str)
    }

    /// Reverse lookup: the Discord member whose linked account is this login.
    pub fn member_linked_to(&self, twitch_login: &str) -> Option<&str> {
        let login = normalize_login(twitch_login);
        self.twitch
            .linked_accounts
            .iter()
            .find(|(_, l)| **l == login)
            .map(|(user_id, _)| user_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    pub twitch_secs: u64,
    pub youtube_secs: u64,
    pub tiktok_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            twitch_secs: 60,
            youtube_secs: 300,
            tiktok_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigStore {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub guilds: IndexMap<String, GuildConfig>,
}

impl ConfigStore {
    /// Loads the store from `path`, normalizing and validating every guild
    /// record. A missing file yields an empty store bound to that path.
    pub async fn load(path: impl AsRef<Path>) -> Result<ConfigStore> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(ConfigStore {
                path: path.to_owned(),
                ..Default::default()
            });
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .context("Reading guild store")?;
        let mut store: ConfigStore =
            serde_yaml::from_str(&raw).context("Parsing guild store")?;
        store.path = path.to_owned();
        for (guild_id, guild) in &mut store.guilds {
            guild.normalize();
            guild
                .validate()
                .wrap_err_with(|| format!("Invalid config for guild {guild_id}"))?;
        }
        Ok(store)
    }

    pub async fn save(&self) -> Result<()> {
        let raw = serde_yaml::to_string(self).context("Serializing guild store")?;
        tokio::fs::write(&self.path, raw)
            .await
            .context("Writing guild store")?;
        Ok(())
    }

    pub fn get_or_create(&mut self, guild_id: &str) -> &mut GuildConfig {
        self.guilds.entry(guild_id.to_owned()).or_default()
    }

    pub fn get(&self, guild_id: &str) -> Option<&GuildConfig> {
        self.guilds.get(guild_id)
    }

    pub fn delete_guild(&mut self, guild_id: &str) -> bool {
        self.guilds.shift_remove(guild_id).is_some()
    }

    /// Cloned view for one poll tick, so monitors never hold the lock across
    /// network calls.
    pub fn snapshot(&self) -> Vec<(String, GuildConfig)> {
        self.guilds
            .iter()
            .map(|(id, g)| (id.clone(), g.clone()))
            .collect()
    }
}

pub fn normalize_login(input: &str) -> String {
    input.trim().trim_start_matches('@').to_lowercase()
}

fn dedupe(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lazy_creation_uses_default_templates() {
        let mut store = ConfigStore::default();
        let guild = store.get_or_create("123");

        assert!(guild.channel_id.is_none());
        assert!(guild.twitch.message.contains("{username}"));
        assert!(guild.youtube.message.contains("{channel}"));
        assert!(guild.tiktok.message.contains("{description}"));
        assert_eq!(store.guilds.len(), 1);
    }

    #[test]
    fn streamer_add_normalizes_and_rejects_duplicates() {
        let mut guild = GuildConfig::default();

        assert!(guild.add_streamer("  Alice "));
        assert!(!guild.add_streamer("alice"));
        assert!(!guild.add_streamer("ALICE"));
        assert_eq!(guild.twitch.usernames, vec!["alice"]);

        assert!(guild.remove_streamer("Alice"));
        assert!(!guild.remove_streamer("alice"));
    }

    #[test]
    fn tiktok_add_strips_at_prefix() {
        let mut guild = GuildConfig::default();

        assert!(guild.add_tiktok("@Bob"));
        assert!(!guild.add_tiktok("bob"));
        assert_eq!(guild.tiktok.usernames, vec!["bob"]);
    }

    #[test]
    fn removing_a_streamer_drops_its_custom_message() {
        let mut guild = GuildConfig::default();
        guild.add_streamer("alice");
        guild.set_twitch_custom_message("Alice", "custom {url}");

        assert!(guild.twitch.custom_messages.contains_key("alice"));
        guild.remove_streamer("alice");
        assert!(guild.twitch.custom_messages.is_empty());
    }

    #[test]
    fn custom_messages_can_be_cleared() {
        let mut guild = GuildConfig::default();
        guild.set_tiktok_custom_message("@Bob", "new post: {url}");

        assert!(guild.clear_tiktok_custom_message("bob"));
        assert!(!guild.clear_tiktok_custom_message("bob"));
        assert!(!guild.clear_twitch_custom_message("bob"));
    }

    #[test]
    fn linked_account_reverse_lookup() {
        let mut guild = GuildConfig::default();
        guild.link_account("999", "Alice");

        assert_eq!(guild.linked_twitch("999"), Some("alice"));
        assert_eq!(guild.member_linked_to("ALICE"), Some("999"));
        assert_eq!(guild.member_linked_to("bob"), None);

        assert!(guild.unlink_account("999"));
        assert!(!guild.unlink_account("999"));
    }

    #[test]
    fn normalize_cleans_loaded_records() {
        let mut guild = GuildConfig {
            twitch: TwitchSection {
                usernames: vec!["Alice".into(), "alice".into(), "Bob".into()],
                custom_messages: [("ALICE".to_owned(), "hi".to_owned())].into_iter().collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        guild.normalize();

        assert_eq!(guild.twitch.usernames, vec!["alice", "bob"]);
        assert_eq!(guild.twitch.custom_messages.get("alice"), Some(&"hi".to_owned()));
    }

    #[tokio::test]
    async fn store_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("herald-store-{}.yaml", std::process::id()));
        let mut store = ConfigStore {
            path: path.clone(),
            ..Default::default()
        };
        let guild = store.get_or_create("42");
        guild.set_channel("100");
        guild.add_streamer("alice");
        guild.add_youtube_channel("UCabcabcabcabcabcabcabca");
        store.save().await.unwrap();

        let loaded = ConfigStore::load(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let guild = loaded.get("42").unwrap();
        assert_eq!(guild.channel_id.as_deref(), Some("100"));
        assert_eq!(guild.twitch.usernames, vec!["alice"]);
        assert_eq!(guild.youtube.channel_ids, vec!["UCabcabcabcabcabcabcabca"]);
        assert_eq!(loaded.poll.twitch_secs, 60);
    }

    #[tokio::test]
    async fn missing_file_yields_empty_store() {
        let store = ConfigStore::load("/nonexistent/herald.yaml").await.unwrap();
        assert!(store.guilds.is_empty());
    }
}
