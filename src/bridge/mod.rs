use crate::activity::{compose, Activity, TimeAnchor};
use crate::cover::{CoverResolver, CoverUrlCache};
use crate::player::{PlayerChannel, PropertySnapshot};
use crate::presence::PresenceChannel;
use crate::supervisor::ConnectionSupervisor;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Mutable per-loop bookkeeping. Touched only by the synchronous part of a
/// tick; the spawned update tasks never see it.
pub struct LoopState {
    pub time_anchor: TimeAnchor,
    pub cover_cache: CoverUrlCache,
}

/// The fixed-interval driver tying the two channels together.
///
/// Each tick queries the player for a property snapshot, composes an
/// Activity, and dispatches it to the presence channel on a fire-and-forget
/// task so a slow presence write never delays the next poll. Per-tick
/// failures are classified at this boundary: a closed player stops the
/// loop, a broken presence pipe hands the channel to the supervisor, and
/// everything else is logged and skipped.
pub struct Bridge {
    player: PlayerChannel,
    presence: Arc<PresenceChannel>,
    supervisor: Arc<ConnectionSupervisor>,
    cover: CoverResolver,
    tick_interval: Duration,
    state: LoopState,
}

fn media_dir(snapshot: &PropertySnapshot) -> Option<PathBuf> {
    let path = snapshot.string("path")?;
    let parent = std::path::Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        return None;
    }
    Some(parent.to_path_buf())
}

impl Bridge {
    pub fn new(
        player: PlayerChannel,
        presence: Arc<PresenceChannel>,
        supervisor: Arc<ConnectionSupervisor>,
        cover: CoverResolver,
        tick_interval: Duration,
    ) -> Self {
        Self {
            player,
            presence,
            supervisor,
            cover,
            tick_interval,
            state: LoopState {
                time_anchor: TimeAnchor::new(Utc::now().timestamp_millis()),
                cover_cache: CoverUrlCache::new(),
            },
        }
    }

    /// Run ticks until the player connection is gone.
    pub async fn run(&mut self) {
        let mut timer = interval(self.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;

            let snapshot = match self.player.fetch_snapshot().await {
                Ok(snapshot) => snapshot,
                Err(err) if err.is_disconnect() => {
                    info!(channel = "mpv-ipc", "player connection closed, stopping");
                    break;
                }
                Err(err) => {
                    warn!(channel = "mpv-ipc", error = %err, "property query failed");
                    continue;
                }
            };

            let cover_url = match media_dir(&snapshot) {
                Some(dir) => self.cover.resolve(&mut self.state.cover_cache, &dir).await,
                None => None,
            };

            let now_ms = Utc::now().timestamp_millis();
            let activity = match compose(
                &snapshot,
                cover_url,
                &mut self.state.time_anchor,
                now_ms,
            ) {
                Ok(activity) => activity,
                Err(err) => {
                    warn!(error = %err, "activity composition failed, skipping tick");
                    continue;
                }
            };

            if self.presence.is_connected() {
                let presence = Arc::clone(&self.presence);
                let supervisor = Arc::clone(&self.supervisor);
                tokio::spawn(dispatch_update(presence, supervisor, activity));
            }
        }
    }

    /// Release both channels, player first, each exactly once. Run on
    /// every exit path; a close failure here is a fatal diagnostic for the
    /// caller.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.player.is_closed() {
            self.player
                .close()
                .await
                .context("closing player channel")?;
            info!(channel = "mpv-ipc", "disconnected");
        }
        if !self.presence.is_closed() {
            let was_connected = self.presence.is_connected();
            self.supervisor
                .shutdown()
                .await
                .context("closing presence channel")?;
            if was_connected {
                info!(channel = "discord-ipc", "disconnected");
            }
        }
        Ok(())
    }
}

/// Completion side of one fired-off update: classifies the result and only
/// ever touches presence connection state, never the loop's own state.
async fn dispatch_update(
    presence: Arc<PresenceChannel>,
    supervisor: Arc<ConnectionSupervisor>,
    activity: Activity,
) {
    match presence.update(&activity).await {
        Ok(()) => {}
        Err(err) if err.is_disconnect() => {
            debug!(channel = "discord-ipc", error = %err, "peer gone during update");
            presence.close().await;
            if !supervisor.is_stopped() {
                info!(channel = "discord-ipc", "reconnecting");
                supervisor.spawn_retry();
            }
        }
        Err(err) => {
            warn!(channel = "discord-ipc", error = %err, "activity update failed");
        }
    }
}
