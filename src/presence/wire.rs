use crate::channel::ChannelError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Opcode carrying the protocol-version handshake.
pub const OP_HANDSHAKE: u32 = 0;
/// Opcode carrying command frames (activity updates).
pub const OP_FRAME: u32 = 1;

/// Frames from the host are small; anything larger is a framing error.
const MAX_PAYLOAD_LEN: u32 = 1 << 20;

/// Encode one frame: little-endian opcode + payload length, then the
/// UTF-8 JSON body.
pub fn encode_frame(opcode: u32, payload: &serde_json::Value) -> Result<Vec<u8>, ChannelError> {
    let body = serde_json::to_vec(payload).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&opcode.to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub async fn write_frame<W>(
    writer: &mut W,
    opcode: u32,
    payload: &serde_json::Value,
) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(opcode, payload)?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| ChannelError::from_io(&e))
}

pub async fn read_frame<R>(reader: &mut R) -> Result<(u32, serde_json::Value), ChannelError>
where
    R: AsyncRead + Unpin,
{
    let opcode = reader
        .read_u32_le()
        .await
        .map_err(|e| ChannelError::from_io(&e))?;
    let len = reader
        .read_u32_le()
        .await
        .map_err(|e| ChannelError::from_io(&e))?;
    if len > MAX_PAYLOAD_LEN {
        return Err(ChannelError::Protocol(format!(
            "frame payload of {} bytes exceeds limit",
            len
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| ChannelError::from_io(&e))?;
    let payload =
        serde_json::from_slice(&body).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    Ok((opcode, payload))
}
