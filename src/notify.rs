//! Notification construction and delivery.
//!
//! A notification is the guild's template for the platform (or a per-entity
//! custom override) with placeholders substituted. Missing platform fields
//! substitute a literal fallback, never a dangling placeholder. Twitch
//! notifications carry an embed and a link button; YouTube and TikTok are
//! plain text with the URL appended.

use tracing::warn;

use crate::config::{normalize_login, GuildConfig};
use crate::discord::{DeliveryError, Embed, EmbedField, EmbedImage, Messenger, OutgoingMessage};
use crate::types::{MessageRef, Platform, PostEvent, StreamEvent, VideoEvent};

const TWITCH_PURPLE: u32 = 0x9146FF;

const UNKNOWN_GAME: &str = "Unknown";
const NO_DESCRIPTION: &str = "No description";

pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (placeholder, value) in values {
        out = out.replace(placeholder, value);
    }
    out
}

fn select_template(default: &str, custom: Option<&String>) -> String {
    custom.map(String::clone).unwrap_or_else(|| default.to_owned())
}

pub fn stream_message(guild: &GuildConfig, event: &StreamEvent) -> OutgoingMessage {
    let template = select_template(
        &guild.twitch.message,
        guild.twitch.custom_messages.get(&normalize_login(&event.user_login)),
    );
    let game = if event.game_name.is_empty() {
        UNKNOWN_GAME
    } else {
        event.game_name.as_str()
    };
    let url = event.url();
    let content = render(
        &template,
        &[
            ("{username}", &event.user_name),
            ("{title}", &event.title),
            ("{game}", game),
            ("{url}", &url),
        ],
    );

    let embed = Embed {
        title: Some(event.title.clone()),
        url: Some(url.clone()),
        color: Some(TWITCH_PURPLE),
        fields: vec![
            EmbedField {
                name: "Game".to_owned(),
                value: game.to_owned(),
                inline: true,
            },
            EmbedField {
                name: "Viewers".to_owned(),
                value: event.viewer_count.to_string(),
                inline: true,
            },
        ],
        thumbnail: stream_thumbnail(event),
        timestamp: event.started_at.map(|t| t.to_rfc3339()),
        ..Default::default()
    };

    OutgoingMessage::text(content)
        .with_embed(embed)
        .with_link_button("Watch on Twitch", url)
}

// Helix hands out a size-templated thumbnail URL.
fn stream_thumbnail(event: &StreamEvent) -> Option<EmbedImage> {
    if event.thumbnail_url.is_empty() {
        return None;
    }
    Some(EmbedImage {
        url: event
            .thumbnail_url
            .replace("{width}", "440")
            .replace("{height}", "248"),
    })
}

pub fn video_message(guild: &GuildConfig, event: &VideoEvent) -> OutgoingMessage {
    let url = event.url();
    let content = render(
        &guild.youtube.message,
        &[
            ("{channel}", &event.channel_title),
            ("{title}", &event.title),
            ("{url}", &url),
        ],
    );
    OutgoingMessage::text(format!("{content}\n{url}"))
}

pub fn post_message(guild: &GuildConfig, event: &PostEvent) -> OutgoingMessage {
    let template = select_template(
        &guild.tiktok.message,
        guild.tiktok.custom_messages.get(&normalize_login(&event.username)),
    );
    let description = if event.description.is_empty() {
        NO_DESCRIPTION
    } else {
        event.description.as_str()
    };
    let username = if event.nickname.is_empty() {
        event.username.as_str()
    } else {
        event.nickname.as_str()
    };
    let url = event.url();
    let content = render(
        &template,
        &[
            ("{username}", username),
            ("{description}", description),
            ("{url}", &url),
        ],
    );
    OutgoingMessage::text(format!("{content}\n{url}"))
}

/// Delivers one notification. A failure is logged and swallowed: a gone
/// channel or missing permission drops this notification only and must not
/// disturb the surrounding poll loop.
pub async fn deliver<M: Messenger>(
    messenger: &M,
    platform: Platform,
    guild_id: &str,
    channel_id: &str,
    message: &OutgoingMessage,
) -> Option<MessageRef> {
    match messenger.send(channel_id, message).await {
        Ok(sent) => Some(sent),
        Err(DeliveryError::UnknownTarget) => {
            warn!("{platform}: notification channel {channel_id} for guild {guild_id} no longer exists");
            None
        }
        Err(err) => {
            warn!("{platform}: failed to notify guild {guild_id}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn stream(game_name: &str) -> StreamEvent {
        StreamEvent {
            user_login: "alice".to_owned(),
            user_name: "Alice".to_owned(),
            title: "speedrun".to_owned(),
            game_id: "100".to_owned(),
            game_name: game_name.to_owned(),
            viewer_count: 7,
            started_at: Some(Utc::now()),
            thumbnail_url: "https://cdn.example/live_user_alice-{width}x{height}.jpg".to_owned(),
        }
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let out = render("{u} and {u} and {t}", &[("{u}", "alice"), ("{t}", "x")]);
        assert_eq!(out, "alice and alice and x");
    }

    #[test]
    fn stream_message_substitutes_placeholders() {
        let guild = GuildConfig::default();
        let msg = stream_message(&guild, &stream("Tetris"));

        assert!(msg.content.contains("Alice"));
        assert!(msg.content.contains("speedrun"));
        assert!(msg.content.contains("Tetris"));
        assert!(!msg.content.contains('{'));
        assert_eq!(msg.embeds.len(), 1);
        assert_eq!(msg.components.len(), 1);
    }

    #[test]
    fn missing_game_substitutes_unknown() {
        let guild = GuildConfig::default();
        let msg = stream_message(&guild, &stream(""));

        assert!(msg.content.contains("Unknown"));
        assert_eq!(msg.embeds[0].fields[0].value, "Unknown");
    }

    #[test]
    fn custom_message_overrides_default() {
        let mut guild = GuildConfig::default();
        guild.set_twitch_custom_message("Alice", "go watch {username} at {url}");
        let msg = stream_message(&guild, &stream("Tetris"));

        assert_eq!(msg.content, "go watch Alice at https://twitch.tv/alice");
    }

    #[test]
    fn thumbnail_size_template_is_filled() {
        let guild = GuildConfig::default();
        let msg = stream_message(&guild, &stream("Tetris"));
        let thumb = msg.embeds[0].thumbnail.as_ref().unwrap();

        assert_eq!(thumb.url, "https://cdn.example/live_user_alice-440x248.jpg");
    }

    #[test]
    fn video_message_appends_url() {
        let guild = GuildConfig::default();
        let event = VideoEvent {
            channel_id: "UCx".to_owned(),
            channel_title: "SomeChannel".to_owned(),
            video_id: "v123".to_owned(),
            title: "a video".to_owned(),
        };
        let msg = video_message(&guild, &event);

        assert!(msg.content.contains("SomeChannel"));
        assert!(msg.content.ends_with("https://www.youtube.com/watch?v=v123"));
        assert!(msg.embeds.is_empty());
    }

    #[test]
    fn empty_post_description_substitutes_fallback() {
        let guild = GuildConfig::default();
        let event = PostEvent {
            username: "bob".to_owned(),
            nickname: String::new(),
            post_id: "p1".to_owned(),
            description: String::new(),
        };
        let msg = post_message(&guild, &event);

        assert!(msg.content.contains("No description"));
        assert!(msg.content.contains("bob"));
        assert!(msg.content.contains("https://www.tiktok.com/@bob/video/p1"));
    }
}
