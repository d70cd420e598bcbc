use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, parsed from positional process arguments.
///
/// Argument order matches the launcher script: mpv socket path, Discord
/// application id, then the optional Discord bot token and TinyURL token
/// used by the cover-art collaborators. Empty token arguments are treated
/// as not provided.
#[derive(Debug, Clone)]
pub struct Config {
    pub player_socket: PathBuf,
    pub client_id: String,
    pub discord_token: Option<String>,
    pub tinyurl_token: Option<String>,
    pub tick_interval: Duration,
    pub retry_delay: Duration,
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

/// Missing or malformed process arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageError {
    MissingSocketPath,
    MissingClientId,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::MissingSocketPath => write!(f, "mpv socket path is required"),
            UsageError::MissingClientId => write!(f, "presence application id is required"),
        }
    }
}

impl std::error::Error for UsageError {}

impl Config {
    /// Parse from an argument iterator (without the program name).
    pub fn from_args<I>(mut args: I) -> Result<Self, UsageError>
    where
        I: Iterator<Item = String>,
    {
        let player_socket = args.next().ok_or(UsageError::MissingSocketPath)?;
        if player_socket.is_empty() {
            return Err(UsageError::MissingSocketPath);
        }
        let client_id = args.next().ok_or(UsageError::MissingClientId)?;
        if client_id.is_empty() {
            return Err(UsageError::MissingClientId);
        }
        let discord_token = args.next().filter(|t| !t.is_empty());
        let tinyurl_token = args.next().filter(|t| !t.is_empty());

        Ok(Self {
            player_socket: PathBuf::from(player_socket),
            client_id,
            discord_token,
            tinyurl_token,
            tick_interval: default_tick_interval(),
            retry_delay: default_retry_delay(),
        })
    }
}
