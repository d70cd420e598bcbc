use crate::channel::ChannelError;
use crate::presence::PresenceChannel;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Connect/retry state machine for the presence channel.
///
/// The player channel is never retried; once it is gone there is nothing
/// left to report and the supervisor shuts down. At most one retry loop is
/// live per presence-channel lifetime: every `spawn_retry` bumps a
/// generation counter, and a retry task that observes a newer generation
/// exits instead of resurrecting a superseded connection.
pub struct ConnectionSupervisor {
    presence: Arc<PresenceChannel>,
    retry_delay: Duration,
    generation: AtomicU64,
    stopped: AtomicBool,
}

impl ConnectionSupervisor {
    pub fn new(presence: Arc<PresenceChannel>, retry_delay: Duration) -> Self {
        Self {
            presence,
            retry_delay,
            generation: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Start (or restart) the retry loop. Any previously spawned loop is
    /// invalidated by the generation bump and exits on its next wakeup.
    pub fn spawn_retry(self: &Arc<Self>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(supervisor.retry_delay).await;
                if supervisor.is_stopped()
                    || supervisor.generation.load(Ordering::SeqCst) != generation
                {
                    return;
                }
                match supervisor.presence.open().await {
                    Ok(()) => {
                        info!(channel = "discord-ipc", "connected");
                        return;
                    }
                    Err(err) => {
                        debug!(channel = "discord-ipc", error = %err, "connect attempt failed");
                    }
                }
            }
        });
    }

    /// Terminal shutdown: stop any retry loop and close the channel.
    /// Called when the player connection is observed closed or the process
    /// is exiting.
    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        self.stopped.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.presence.shutdown().await
    }
}
