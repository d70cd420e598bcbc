use std::fmt;
use std::io;

/// Lifecycle of an IPC channel.
///
/// The player channel only ever moves Disconnected → Connected → Closed.
/// The presence channel additionally cycles through Connecting and back to
/// Disconnected under supervisor control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Errors surfaced by the IPC channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Endpoint unreachable or refused the connection.
    Connect(String),
    /// Peer vanished mid-session (EPIPE / connection reset).
    BrokenPipe,
    /// Peer closed the stream gracefully (zero-length read).
    EndOfStream,
    /// Peer sent something the protocol does not allow.
    Protocol(String),
    /// Any other transport failure.
    Io(String),
}

impl ChannelError {
    /// True when the peer is gone and the connection cannot be reused.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChannelError::BrokenPipe | ChannelError::EndOfStream)
    }

    /// Map a transport error onto the channel taxonomy.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => ChannelError::BrokenPipe,
            io::ErrorKind::UnexpectedEof => ChannelError::EndOfStream,
            _ => ChannelError::Io(err.to_string()),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Connect(msg) => write!(f, "connect failed: {}", msg),
            ChannelError::BrokenPipe => write!(f, "broken pipe: peer is gone"),
            ChannelError::EndOfStream => write!(f, "end of stream: peer closed the connection"),
            ChannelError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            ChannelError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}
