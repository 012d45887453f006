//! Delivery sinks.
//!
//! The gateway/command side of the bot is an external collaborator; the core
//! only needs to post and edit channel messages and toggle one role. Both
//! contracts are traits so the monitors can be exercised against in-memory
//! fakes, with [`DiscordClient`] as the REST-backed implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::MessageRef;

const API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The channel or message no longer exists.
    #[error("unknown channel or message")]
    UnknownTarget,
    #[error("missing access or permissions")]
    Forbidden,
    #[error("discord returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_embed(mut self, embed: Embed) -> OutgoingMessage {
        self.embeds.push(embed);
        self
    }

    pub fn with_link_button(mut self, label: impl Into<String>, url: impl Into<String>) -> OutgoingMessage {
        self.components.push(ActionRow {
            kind: 1,
            components: vec![Component::LinkButton {
                kind: 2,
                style: 5,
                label: label.into(),
                url: url.into(),
            }],
        });
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Component {
    LinkButton {
        #[serde(rename = "type")]
        kind: u8,
        style: u8,
        label: String,
        url: String,
    },
}

pub trait Messenger: Send + Sync {
    async fn send(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, DeliveryError>;

    async fn edit(
        &self,
        target: &MessageRef,
        message: &OutgoingMessage,
    ) -> Result<(), DeliveryError>;
}

/// Both calls are idempotent on Discord's side: adding a role a member
/// already holds (or removing one they don't) succeeds without effect.
pub trait RoleSink: Send + Sync {
    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), DeliveryError>;

    async fn remove_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    token: String,
    base: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    id: String,
}

impl DiscordClient {
    pub fn new(token: &str) -> Result<DiscordClient, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(DiscordClient {
            http,
            token: token.to_owned(),
            base: API_BASE.to_owned(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, DeliveryError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    match status.as_u16() {
        404 => Err(DeliveryError::UnknownTarget),
        403 => Err(DeliveryError::Forbidden),
        code => Err(DeliveryError::Status {
            status: code,
            body: res.text().await.unwrap_or_default(),
        }),
    }
}

impl Messenger for DiscordClient {
    async fn send(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, DeliveryError> {
        let res = self
            .http
            .post(format!("{}/channels/{channel_id}/messages", self.base))
            .header("Authorization", self.auth())
            .json(message)
            .send()
            .await?;
        let created: MessageCreated = check(res).await?.json().await?;
        Ok(MessageRef {
            channel_id: channel_id.to_owned(),
            message_id: created.id,
        })
    }

    async fn edit(
        &self,
        target: &MessageRef,
        message: &OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let res = self
            .http
            .patch(format!(
                "{}/channels/{}/messages/{}",
                self.base, target.channel_id, target.message_id
            ))
            .header("Authorization", self.auth())
            .json(message)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}

impl RoleSink for DiscordClient {
    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), DeliveryError> {
        let res = self
            .http
            .put(format!(
                "{}/guilds/{guild_id}/members/{user_id}/roles/{role_id}",
                self.base
            ))
            .header("Authorization", self.auth())
            .header("Content-Length", "0")
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), DeliveryError> {
        let res = self
            .http
            .delete(format!(
                "{}/guilds/{guild_id}/members/{user_id}/roles/{role_id}",
                self.base
            ))
            .header("Authorization", self.auth())
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}
