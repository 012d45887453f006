use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, GuildConfig};
use crate::discord::Messenger;
use crate::notify;
use crate::tiktok::PostsApi;
use crate::types::{Platform, PostEvent};

/// Spacing between consecutive per-user fetches. Scraping too fast gets the
/// bot rate limited or captcha-walled; this is a throughput throttle, not a
/// correctness requirement.
const USER_DELAY: Duration = Duration::from_secs(2);

pub struct TikTokMonitor<A, S> {
    store: Arc<RwLock<ConfigStore>>,
    api: Arc<A>,
    sink: Arc<S>,
    interval: Duration,
    /// guild id -> username -> last known newest post id
    seen: HashMap<String, HashMap<String, String>>,
}

impl<A, S> TikTokMonitor<A, S>
where
    A: PostsApi,
    S: Messenger,
{
    pub fn new(
        store: Arc<RwLock<ConfigStore>>,
        api: Arc<A>,
        sink: Arc<S>,
        interval: Duration,
    ) -> TikTokMonitor<A, S> {
        TikTokMonitor {
            store,
            api,
            sink,
            interval,
            seen: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!("starting tiktok monitor");
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    async fn tick(&mut self) {
        let guilds = self.store.read().await.snapshot();

        for (guild_id, guild) in guilds {
            let Some(channel_id) = guild.channel_id.clone() else {
                continue;
            };

            for username in guild.tiktok.usernames.clone() {
                match self.api.latest_post(&username).await {
                    Ok(Some(post)) => {
                        self.observe_post(&guild_id, &guild, &channel_id, &username, post)
                            .await
                    }
                    // No strategy yielded data this cycle: cached state stays
                    // as it is and the remaining users are still checked.
                    Ok(None) => debug!("no data for tiktok user @{username} this cycle"),
                    Err(err) => {
                        warn!("checking tiktok user @{username} for guild {guild_id}: {err}")
                    }
                }

                sleep(USER_DELAY).await;
            }
        }
    }

    async fn observe_post(
        &mut self,
        guild_id: &str,
        guild: &GuildConfig,
        channel_id: &str,
        username: &str,
        post: PostEvent,
    ) {
        let seen = self.seen.entry(guild_id.to_owned()).or_default();
        match seen.entry(username.to_owned()) {
            Entry::Vacant(slot) => {
                debug!("tracking tiktok user @{username}, newest post {}", post.post_id);
                slot.insert(post.post_id);
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() == post.post_id {
                    return;
                }
                info!("new tiktok post by @{username}: {}", post.post_id);
                slot.insert(post.post_id.clone());
                notify::deliver(
                    self.sink.as_ref(),
                    Platform::TikTok,
                    guild_id,
                    channel_id,
                    &notify::post_message(guild, &post),
                )
                .await;
            }
        }
    }
}

/// Manual nudge: the current newest post of each account, same throttling as
/// the scheduled loop, no cache involvement.
pub async fn check_specific_accounts<A: PostsApi>(api: &A, usernames: &[String]) -> Vec<PostEvent> {
    let mut posts = Vec::new();
    for username in usernames {
        match api.latest_post(username).await {
            Ok(Some(post)) => posts.push(post),
            Ok(None) => debug!("no data for tiktok user @{username}"),
            Err(err) => warn!("manual tiktok check for @{username}: {err}"),
        }
        sleep(USER_DELAY).await;
    }
    posts
}
