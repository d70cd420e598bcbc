use anyhow::{Context, Result};
use mpv_presence::bridge::Bridge;
use mpv_presence::config::Config;
use mpv_presence::cover::CoverResolver;
use mpv_presence::player::PlayerChannel;
use mpv_presence::presence::PresenceChannel;
use mpv_presence::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpv_presence=info".into()),
        )
        .init();

    let config = Config::from_args(std::env::args().skip(1)).context(
        "usage: mpv-presence <mpv-socket> <application-id> [discord-token] [tinyurl-token]",
    )?;

    // The player connects once, eagerly; an unreachable socket is fatal.
    let player = PlayerChannel::open(&config.player_socket)
        .await
        .with_context(|| {
            format!(
                "failed to connect to mpv at {}",
                config.player_socket.display()
            )
        })?;
    info!(channel = "mpv-ipc", "connected");

    let presence = Arc::new(PresenceChannel::new(config.client_id.clone()));
    let supervisor = Arc::new(ConnectionSupervisor::new(
        Arc::clone(&presence),
        config.retry_delay,
    ));
    supervisor.spawn_retry();

    let cover = CoverResolver::new(config.discord_token.clone(), config.tinyurl_token.clone());
    let mut bridge = Bridge::new(player, presence, supervisor, cover, config.tick_interval);

    bridge.run().await;
    bridge.shutdown().await
}
