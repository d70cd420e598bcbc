use crate::activity::Activity;
use crate::channel::{ChannelError, ConnectionState};
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::trace;

pub mod payload;
pub mod wire;


/// Client for the desktop rich-presence pipe.
///
/// Shared between the tick loop's fire-and-forget update tasks and the
/// connection supervisor, so the connection lives behind an async mutex
/// while the lifecycle state is readable without awaiting. Unlike the
/// player channel this one is reopened after a dropped peer; only an
/// explicit shutdown is terminal.
pub struct PresenceChannel {
    client_id: String,
    endpoint: Option<PathBuf>,
    stream: Mutex<Option<UnixStream>>,
    state: StdMutex<ConnectionState>,
}

fn candidate_paths() -> Vec<PathBuf> {
    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|key| std::env::var_os(key).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    (0..10).map(|i| base.join(format!("discord-ipc-{i}"))).collect()
}

impl PresenceChannel {
    /// A channel that discovers the host pipe (`discord-ipc-{0..9}` under
    /// the runtime directory) on each open.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            endpoint: None,
            stream: Mutex::new(None),
            state: StdMutex::new(ConnectionState::Disconnected),
        }
    }

    /// A channel pinned to one pipe path.
    pub fn with_endpoint(client_id: impl Into<String>, endpoint: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::new(client_id)
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Terminal-shutdown flag; a dropped peer reads as Disconnected, not
    /// closed, because the supervisor will reopen it.
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Connect to the host pipe and run the protocol-version handshake.
    ///
    /// A host that is not listening is the common case; the supervisor
    /// retries on `Connect`. Reopening an already-connected channel is a
    /// no-op so a stale retry cannot clobber a live connection.
    pub async fn open(&self) -> Result<(), ChannelError> {
        let mut slot = self.stream.lock().await;
        if self.is_closed() {
            return Err(ChannelError::Connect("channel is shut down".into()));
        }
        if slot.is_some() {
            return Ok(());
        }
        let handshake = serde_json::to_value(payload::Handshake {
            v: 1,
            client_id: self.client_id.clone(),
        })
        .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        self.set_state(ConnectionState::Connecting);

        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(err);
            }
        };
        let result = async {
            wire::write_frame(&mut stream, wire::OP_HANDSHAKE, &handshake).await?;
            let (opcode, body) = wire::read_frame(&mut stream).await?;
            trace!(channel = "discord-ipc", opcode, %body, "handshake reply");
            Ok::<_, ChannelError>(())
        }
        .await;
        if let Err(err) = result {
            self.set_state(ConnectionState::Disconnected);
            return Err(ChannelError::Connect(err.to_string()));
        }

        *slot = Some(stream);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn connect(&self) -> Result<UnixStream, ChannelError> {
        if let Some(path) = &self.endpoint {
            return UnixStream::connect(path)
                .await
                .map_err(|e| ChannelError::Connect(format!("{}: {}", path.display(), e)));
        }
        for path in candidate_paths() {
            if let Ok(stream) = UnixStream::connect(&path).await {
                return Ok(stream);
            }
        }
        Err(ChannelError::Connect(
            "no rich-presence pipe is listening".into(),
        ))
    }

    /// Encode and send one activity-update frame.
    ///
    /// Responses are not correlated to requests; a read failure on the
    /// same connection after the write is what reports the write as
    /// failed. A disconnecting error drops the connection so the caller
    /// can hand the channel back to the supervisor.
    pub async fn update(&self, activity: &Activity) -> Result<(), ChannelError> {
        let mut slot = self.stream.lock().await;
        let stream = slot.as_mut().ok_or(ChannelError::BrokenPipe)?;

        let body = serde_json::to_value(payload::set_activity(activity))
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        let result = async {
            wire::write_frame(&mut *stream, wire::OP_FRAME, &body).await?;
            wire::read_frame(&mut *stream).await.map(|_| ())
        }
        .await;

        if let Err(err) = &result {
            if err.is_disconnect() {
                *slot = None;
                if !self.is_closed() {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
        result
    }

    /// Drop the connection so the supervisor can reopen it.
    pub async fn close(&self) {
        let mut slot = self.stream.lock().await;
        if slot.take().is_some() && !self.is_closed() {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Terminal close at process shutdown; the channel cannot be reopened.
    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        let mut slot = self.stream.lock().await;
        self.set_state(ConnectionState::Closed);
        if let Some(mut stream) = slot.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| ChannelError::Io(e.to_string()))?;
        }
        Ok(())
    }
}
