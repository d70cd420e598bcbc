use crate::channel::{ChannelError, ConnectionState};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::trace;

#[cfg(test)]
mod tests;

/// A property value read from the player.
///
/// The player's wire protocol is JSON-typed; a property that the player
/// cannot serve right now (no file loaded, no such track) is `Absent`
/// rather than an error, so a missing tag never kills a query round.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Absent,
}

impl PropertyValue {
    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Number(n) => {
                PropertyValue::Number(n.as_f64().unwrap_or_default())
            }
            serde_json::Value::Bool(b) => PropertyValue::Boolean(b),
            _ => PropertyValue::Absent,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One tick's worth of player properties. Not retained across ticks.
#[derive(Debug, Clone, Default)]
pub struct PropertySnapshot {
    values: HashMap<String, PropertyValue>,
}

impl PropertySnapshot {
    pub fn insert(&mut self, name: &str, value: PropertyValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Look up a property; unknown names read as `Absent`.
    pub fn get(&self, name: &str) -> &PropertyValue {
        static ABSENT: PropertyValue = PropertyValue::Absent;
        self.values.get(name).unwrap_or(&ABSENT)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }
}

/// Properties queried with `get_property` (JSON-typed values).
const TYPED_PROPERTIES: &[&str] = &[
    "metadata/by-key/Artist",
    "metadata/by-key/Album",
    "aid",
    "vid",
    "paused-for-cache",
    "pause",
    "percent-pos",
    "playlist-count",
    "playlist-pos-1",
    "duration",
    "time-pos",
];

/// Properties queried with `get_property_string` (stringified values).
const STRING_PROPERTIES: &[&str] = &[
    "path",
    "mpv-version",
    "media-title",
    "file-format",
    "loop-file",
    "loop-playlist",
];

/// mpv statuses that mean "no value right now" rather than a failure.
fn is_unavailable(status: &str) -> bool {
    status == "property unavailable" || status == "property not found"
}

#[derive(Deserialize)]
struct PlayerReply {
    request_id: Option<u64>,
    error: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
    event: Option<String>,
}

/// Client for the player's line-oriented JSON IPC socket.
///
/// Connects once, eagerly; there is no retry. Every request carries a
/// correlation id and the reply is matched against it, skipping any
/// unsolicited event lines the player interleaves. EOF or a broken pipe
/// latches the channel closed: all later calls fail fast with the latched
/// error without touching the transport again.
pub struct PlayerChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
    state: ConnectionState,
    latched: Option<ChannelError>,
}

impl PlayerChannel {
    /// One-shot connect to the player's control socket.
    pub async fn open(endpoint: &Path) -> Result<Self, ChannelError> {
        let stream = UnixStream::connect(endpoint)
            .await
            .map_err(|e| ChannelError::Connect(format!("{}: {}", endpoint.display(), e)))?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
            state: ConnectionState::Connected,
            latched: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the peer has closed the channel (latched on EOF/EPIPE).
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Query a property as its JSON-typed value.
    pub async fn get_property(&mut self, name: &str) -> Result<PropertyValue, ChannelError> {
        self.request("get_property", name).await
    }

    /// Query a property through the player's string formatter.
    pub async fn get_property_string(&mut self, name: &str) -> Result<PropertyValue, ChannelError> {
        self.request("get_property_string", name).await
    }

    /// Fetch every property the activity composer consumes, in one round
    /// of correlated requests.
    pub async fn fetch_snapshot(&mut self) -> Result<PropertySnapshot, ChannelError> {
        let mut snapshot = PropertySnapshot::default();
        for name in STRING_PROPERTIES {
            let value = self.get_property_string(name).await?;
            snapshot.insert(name, value);
        }
        for name in TYPED_PROPERTIES {
            let value = self.get_property(name).await?;
            snapshot.insert(name, value);
        }
        Ok(snapshot)
    }

    /// Release the connection. A no-op once the peer-closed state is latched.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.writer
            .shutdown()
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))
    }

    fn latch(&mut self, err: ChannelError) -> ChannelError {
        if err.is_disconnect() {
            self.state = ConnectionState::Closed;
            self.latched = Some(err.clone());
        }
        err
    }

    async fn request(&mut self, command: &str, name: &str) -> Result<PropertyValue, ChannelError> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = serde_json::json!({
            "command": [command, name],
            "request_id": request_id,
        });
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        line.push(b'\n');

        if let Err(e) = self.writer.write_all(&line).await {
            return Err(self.latch(ChannelError::from_io(&e)));
        }

        // Read until the reply with our correlation id shows up; the player
        // interleaves unsolicited event lines on the same stream.
        loop {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf).await {
                Ok(0) => return Err(self.latch(ChannelError::EndOfStream)),
                Ok(_) => {}
                Err(e) => return Err(self.latch(ChannelError::from_io(&e))),
            }

            let reply: PlayerReply = match serde_json::from_str(buf.trim_end()) {
                Ok(reply) => reply,
                Err(_) => continue,
            };
            if reply.event.is_some() {
                trace!(channel = "mpv-ipc", "skipping event line");
                continue;
            }
            match reply.request_id {
                Some(id) if id == request_id => {}
                _ => continue,
            }

            let status = reply.error.unwrap_or_default();
            return if status == "success" {
                Ok(PropertyValue::from_json(reply.data))
            } else if is_unavailable(&status) {
                Ok(PropertyValue::Absent)
            } else {
                Err(ChannelError::Protocol(format!(
                    "property '{}': {}",
                    name, status
                )))
            };
        }
    }
}
