use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigStore, GuildConfig};
use crate::discord::{DeliveryError, Messenger, RoleSink};
use crate::notify;
use crate::twitch::api::StreamsApi;
use crate::twitch::TwitchError;
use crate::types::{MessageRef, Platform, StreamEvent};

/// Runtime record for a streamer currently observed live. Present in the map
/// ⇔ believed live; absence means believed offline.
#[derive(Debug, Clone)]
struct LiveEntry {
    game_id: String,
    message: Option<MessageRef>,
    linked_member: Option<String>,
}

pub struct TwitchMonitor<A, S> {
    store: Arc<RwLock<ConfigStore>>,
    api: Arc<A>,
    sink: Arc<S>,
    interval: Duration,
    /// guild id -> streamer login -> live entry
    live: HashMap<String, HashMap<String, LiveEntry>>,
}

impl<A, S> TwitchMonitor<A, S>
where
    A: StreamsApi,
    S: Messenger + RoleSink,
{
    pub fn new(
        store: Arc<RwLock<ConfigStore>>,
        api: Arc<A>,
        sink: Arc<S>,
        interval: Duration,
    ) -> TwitchMonitor<A, S> {
        TwitchMonitor {
            store,
            api,
            sink,
            interval,
            live: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!("starting twitch monitor");
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    async fn tick(&mut self) {
        let guilds = self.store.read().await.snapshot();
        // At most one token refresh per tick; the failed entity is simply
        // retried on the next pass.
        let mut refreshed = false;

        for (guild_id, guild) in guilds {
            let Some(channel_id) = guild.channel_id.clone() else {
                continue;
            };

            for username in guild.twitch.usernames.clone() {
                match self.api.stream_by_login(&username).await {
                    Ok(Some(stream)) => {
                        self.observe_live(&guild_id, &guild, &channel_id, &username, &stream)
                            .await
                    }
                    Ok(None) => self.observe_offline(&guild_id, &guild, &username).await,
                    Err(TwitchError::Unauthorized) => {
                        if !refreshed {
                            refreshed = true;
                            warn!("twitch token expired, refreshing");
                            if let Err(err) = self.api.refresh_token().await {
                                error!("could not refresh twitch token: {err}");
                            }
                        }
                    }
                    Err(err) => {
                        warn!("checking twitch stream {username} for guild {guild_id}: {err}")
                    }
                }
            }
        }
    }

    async fn observe_live(
        &mut self,
        guild_id: &str,
        guild: &GuildConfig,
        channel_id: &str,
        username: &str,
        stream: &StreamEvent,
    ) {
        let entries = self.live.entry(guild_id.to_owned()).or_default();

        if let Some(entry) = entries.get_mut(username) {
            if entry.game_id == stream.game_id {
                return;
            }
            // Still live, new category: update the original notification
            // instead of posting a duplicate.
            debug!(
                "{username} switched category to {} in guild {guild_id}",
                stream.game_id
            );
            entry.game_id = stream.game_id.clone();
            let Some(target) = entry.message.clone() else {
                return;
            };
            match self
                .sink
                .edit(&target, &notify::stream_message(guild, stream))
                .await
            {
                Ok(()) => {}
                Err(DeliveryError::UnknownTarget) => {
                    debug!("live notification for {username} is gone, skipping edit")
                }
                Err(err) => warn!("editing live notification for {username}: {err}"),
            }
            return;
        }

        info!("{username} went live in guild {guild_id}");
        let message = notify::deliver(
            self.sink.as_ref(),
            Platform::Twitch,
            guild_id,
            channel_id,
            &notify::stream_message(guild, stream),
        )
        .await;

        let linked_member = guild.member_linked_to(username).map(str::to_owned);
        if let (Some(role_id), Some(member)) =
            (guild.live_role_id.as_deref(), linked_member.as_deref())
        {
            if let Err(err) = self.sink.add_role(guild_id, member, role_id).await {
                warn!("adding live role to {member} in guild {guild_id}: {err}");
            }
        }

        entries.insert(
            username.to_owned(),
            LiveEntry {
                game_id: stream.game_id.clone(),
                message,
                linked_member,
            },
        );
    }

    async fn observe_offline(&mut self, guild_id: &str, guild: &GuildConfig, username: &str) {
        let Some(entries) = self.live.get_mut(guild_id) else {
            return;
        };
        let Some(entry) = entries.remove(username) else {
            return;
        };

        info!("{username} went offline in guild {guild_id}");
        if let (Some(role_id), Some(member)) =
            (guild.live_role_id.as_deref(), entry.linked_member.as_deref())
        {
            if let Err(err) = self.sink.remove_role(guild_id, member, role_id).await {
                warn!("removing live role from {member} in guild {guild_id}: {err}");
            }
        }
    }
}

/// Manual nudge: fetch-only check of the given streamers. Returns the
/// currently live ones and never consults or mutates monitor state.
pub async fn check_specific_streamers<A: StreamsApi>(
    api: &A,
    usernames: &[String],
) -> Vec<StreamEvent> {
    let mut live = Vec::new();
    for username in usernames {
        match api.stream_by_login(username).await {
            Ok(Some(stream)) => live.push(stream),
            Ok(None) => {}
            Err(err) => warn!("manual twitch check for {username}: {err}"),
        }
    }
    live
}
