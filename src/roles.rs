//! Presence-driven live-role reconciliation.
//!
//! The gateway glue feeds `(previous, current)` presence snapshots through a
//! channel; this task toggles the configured live role on the streaming edge.
//! Only members with an explicitly linked Twitch account are touched. This
//! signal is independent of the Twitch monitor's poll; both go through the
//! same idempotent role sink, so observing "live" twice is harmless.

use std::sync::Arc;

use flume::Receiver;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ConfigStore;
use crate::discord::RoleSink;
use crate::types::{ActivityKind, PresenceSnapshot};

/// The previous snapshot (when the gateway had one) and the new one.
pub type PresenceUpdate = (Option<PresenceSnapshot>, PresenceSnapshot);

pub struct RoleReconciler<S> {
    store: Arc<RwLock<ConfigStore>>,
    sink: Arc<S>,
}

impl<S: RoleSink> RoleReconciler<S> {
    pub fn new(store: Arc<RwLock<ConfigStore>>, sink: Arc<S>) -> RoleReconciler<S> {
        RoleReconciler { store, sink }
    }

    pub async fn run(self, updates: Receiver<PresenceUpdate>) {
        info!("starting live role reconciler");
        while let Ok((old, new)) = updates.recv_async().await {
            self.handle_presence(old.as_ref(), &new).await;
        }
    }

    pub async fn handle_presence(&self, old: Option<&PresenceSnapshot>, new: &PresenceSnapshot) {
        let Some(guild_id) = new.guild_id.as_deref() else {
            return;
        };

        let role_id = {
            let store = self.store.read().await;
            let Some(guild) = store.get(guild_id) else {
                return;
            };
            let Some(role_id) = guild.live_role_id.clone() else {
                return;
            };
            if guild.linked_twitch(&new.user_id).is_none() {
                return;
            }
            role_id
        };

        let was_streaming = old.map(is_streaming_on_twitch).unwrap_or(false);
        let is_streaming = is_streaming_on_twitch(new);

        match (was_streaming, is_streaming) {
            (false, true) => {
                info!("{} started streaming in guild {guild_id}", new.user_id);
                if let Err(err) = self.sink.add_role(guild_id, &new.user_id, &role_id).await {
                    warn!("adding live role to {} in guild {guild_id}: {err}", new.user_id);
                }
            }
            (true, false) => {
                info!("{} stopped streaming in guild {guild_id}", new.user_id);
                if let Err(err) = self
                    .sink
                    .remove_role(guild_id, &new.user_id, &role_id)
                    .await
                {
                    warn!(
                        "removing live role from {} in guild {guild_id}: {err}",
                        new.user_id
                    );
                }
            }
            _ => {}
        }
    }
}

pub fn is_streaming_on_twitch(presence: &PresenceSnapshot) -> bool {
    presence.activities.iter().any(|activity| {
        activity.kind == ActivityKind::Streaming
            && (activity
                .url
                .as_deref()
                .is_some_and(|url| url.to_lowercase().contains("twitch"))
                || activity.name.to_lowercase().contains("twitch"))
    })
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::discord::DeliveryError;
    use crate::types::Activity;

    #[derive(Default)]
    struct FakeRoles {
        adds: Mutex<Vec<(String, String, String)>>,
        removes: Mutex<Vec<(String, String, String)>>,
    }

    impl RoleSink for FakeRoles {
        async fn add_role(
            &self,
            guild_id: &str,
            user_id: &str,
            role_id: &str,
        ) -> Result<(), DeliveryError> {
            self.adds.lock().unwrap().push((
                guild_id.to_owned(),
                user_id.to_owned(),
                role_id.to_owned(),
            ));
            Ok(())
        }

        async fn remove_role(
            &self,
            guild_id: &str,
            user_id: &str,
            role_id: &str,
        ) -> Result<(), DeliveryError> {
            self.removes.lock().unwrap().push((
                guild_id.to_owned(),
                user_id.to_owned(),
                role_id.to_owned(),
            ));
            Ok(())
        }
    }

    fn reconciler(with_role: bool) -> (RoleReconciler<FakeRoles>, Arc<FakeRoles>) {
        let mut store = ConfigStore::default();
        let guild = store.get_or_create("g1");
        if with_role {
            guild.set_live_role(Some("r1".to_owned()));
        }
        guild.link_account("m1", "alice");

        let sink = Arc::new(FakeRoles::default());
        (
            RoleReconciler::new(Arc::new(RwLock::new(store)), sink.clone()),
            sink,
        )
    }

    fn snapshot(guild_id: Option<&str>, user_id: &str, streaming: bool) -> PresenceSnapshot {
        let activities = if streaming {
            vec![Activity {
                kind: ActivityKind::Streaming,
                name: "Twitch".to_owned(),
                url: Some("https://twitch.tv/alice".to_owned()),
            }]
        } else {
            vec![Activity {
                kind: ActivityKind::Playing,
                name: "Tetris".to_owned(),
                url: None,
            }]
        };
        PresenceSnapshot {
            guild_id: guild_id.map(str::to_owned),
            user_id: user_id.to_owned(),
            activities,
        }
    }

    #[tokio::test]
    async fn streaming_edges_toggle_the_role() {
        let (reconciler, sink) = reconciler(true);

        let off = snapshot(Some("g1"), "m1", false);
        let on = snapshot(Some("g1"), "m1", true);

        reconciler.handle_presence(Some(&off), &on).await;
        assert_eq!(sink.adds.lock().unwrap().len(), 1);

        // already streaming: no duplicate call
        reconciler.handle_presence(Some(&on), &on).await;
        assert_eq!(sink.adds.lock().unwrap().len(), 1);

        reconciler.handle_presence(Some(&on), &off).await;
        assert_eq!(sink.removes.lock().unwrap().len(), 1);

        // already offline: no duplicate call
        reconciler.handle_presence(Some(&off), &off).await;
        assert_eq!(sink.removes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_old_snapshot_counts_as_not_streaming() {
        let (reconciler, sink) = reconciler(true);
        let on = snapshot(Some("g1"), "m1", true);

        reconciler.handle_presence(None, &on).await;
        assert_eq!(sink.adds.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ignores_unlinked_users_and_missing_context() {
        let (reconciler, sink) = reconciler(true);

        // no guild context
        let on = snapshot(None, "m1", true);
        reconciler.handle_presence(None, &on).await;

        // user with no linked account
        let on = snapshot(Some("g1"), "stranger", true);
        reconciler.handle_presence(None, &on).await;

        // unknown guild
        let on = snapshot(Some("g2"), "m1", true);
        reconciler.handle_presence(None, &on).await;

        assert!(sink.adds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_configured_role_means_no_action() {
        let (reconciler, sink) = reconciler(false);
        let on = snapshot(Some("g1"), "m1", true);

        reconciler.handle_presence(None, &on).await;
        assert!(sink.adds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_drains_updates_until_the_feed_closes() {
        let (reconciler, sink) = reconciler(true);
        let (tx, rx) = flume::unbounded();

        let task = tokio::spawn(reconciler.run(rx));
        tx.send_async((None, snapshot(Some("g1"), "m1", true)))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(sink.adds.lock().unwrap().len(), 1);
    }

    #[test]
    fn streaming_detection_requires_a_twitch_activity() {
        let mut presence = snapshot(Some("g1"), "m1", true);
        assert!(is_streaming_on_twitch(&presence));

        // streaming somewhere else
        presence.activities[0].url = Some("https://youtube.com/live/x".to_owned());
        presence.activities[0].name = "YouTube".to_owned();
        assert!(!is_streaming_on_twitch(&presence));

        // twitch name but not a streaming activity
        let playing = snapshot(Some("g1"), "m1", false);
        assert!(!is_streaming_on_twitch(&playing));
    }
}
