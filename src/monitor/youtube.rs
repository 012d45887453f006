use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::discord::Messenger;
use crate::notify;
use crate::types::{Platform, VideoEvent};
use crate::youtube::UploadsApi;

pub struct YouTubeMonitor<A, S> {
    store: Arc<RwLock<ConfigStore>>,
    api: Arc<A>,
    sink: Arc<S>,
    interval: Duration,
    /// guild id -> channel id -> last known newest video id
    seen: HashMap<String, HashMap<String, String>>,
}

impl<A, S> YouTubeMonitor<A, S>
where
    A: UploadsApi,
    S: Messenger,
{
    pub fn new(
        store: Arc<RwLock<ConfigStore>>,
        api: Arc<A>,
        sink: Arc<S>,
        interval: Duration,
    ) -> YouTubeMonitor<A, S> {
        YouTubeMonitor {
            store,
            api,
            sink,
            interval,
            seen: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!("starting youtube monitor");
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

            for yt_channel in guild.youtube.channel_ids.clone() {
                let video = match self.api.latest_video(&yt_channel).await {
                    Ok(Some(video)) => video,
                    Ok(None) => {
                        debug!("youtube channel {yt_channel} has no videos");
                        continue;
                    }
                    Err(err) => {
                        warn!("checking youtube channel {yt_channel} for guild {guild_id}: {err}");
                        continue;
                    }
                };

                let seen = self.seen.entry(guild_id.clone()).or_default();
                match seen.entry(yt_channel) {
                    // First sight only establishes the baseline; notifying
                    // here would announce the entire back catalog on every
                    // restart or newly added channel.
                    Entry::Vacant(slot) => {
                        debug!("tracking youtube channel {}, newest video {}", slot.key(), video.video_id);
                        slot.insert(video.video_id);
                    }
                    Entry::Occupied(mut slot) => {
                        if *slot.get() == video.video_id {
                            continue;
                        }
                        info!("new upload on {}: {}", slot.key(), video.video_id);
                        slot.insert(video.video_id.clone());
                        notify::deliver(
                            self.sink.as_ref(),
                            Platform::YouTube,
                            &guild_id,
                            &channel_id,
                            &notify::video_message(&guild, &video),
                        )
                        .await;
                    }
                }
            }
        }
    }
}

/// Manual nudge: the current newest video of each channel, without touching
/// the monitor's baseline cache.
pub async fn check_specific_channels<A: UploadsApi>(
    api: &A,
    channel_ids: &[String],
) -> Vec<VideoEvent> {
    let mut videos = Vec::new();
    for channel_id in channel_ids {
        match api.latest_video(channel_id).await {
            Ok(Some(video)) => videos.push(video),
            Ok(None) => {}
            Err(err) => warn!("manual youtube check for {channel_id}: {err}"),
        }
    }
    videos
}
