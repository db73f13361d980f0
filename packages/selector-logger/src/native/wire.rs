//! Native-messaging frame codec.
//!
//! Each message, in both directions, is a 4-byte little-endian unsigned
//! length prefix followed by that many bytes of UTF-8 JSON.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{WireError, WireResult};

/// Upper bound on a frame payload. A corrupt length prefix must not turn
/// into an arbitrarily large allocation.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one JSON message as a frame and flush.
pub async fn write_frame<W>(writer: &mut W, message: &Value) -> WireResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::Oversize { len: payload.len() });
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. A clean EOF on the length prefix is [`WireError::Closed`].
pub async fn read_frame<R>(reader: &mut R) -> WireResult<Value>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(WireError::Closed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::Oversize { len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}
