// SPDX-License-Identifier: MIT

//! Newline-delimited JSON framing: each message is one UTF-8
//! JSON object terminated by `\n`; payloads encode embedded newlines as
//! `\\n` so the delimiter is unambiguous. Oversize frames are rejected
//! with [`FrameError::TooLarge`] rather than silently truncated.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

/// Default max frame size: 4 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame exceeds max size of {limit} bytes")]
    TooLarge { limit: usize },
}

/// [`tokio_util::codec::Decoder`]/[`Encoder`] pair for newline-delimited
/// frames, for use with `tokio_util::codec::Framed` over a Unix socket.
/// Decoded items are the raw line bytes (the trailing `\n` stripped, no
/// JSON parsing performed here — that's the listener's job).
pub struct LineCodec {
    max_frame_bytes: usize,
}

impl LineCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for LineCodec {
    type Item = BytesMut;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(pos) = src.iter().position(|b| *b == b'\n') {
            if pos > self.max_frame_bytes {
                // Drain the oversize data so the connection can be closed cleanly.
                src.advance(pos + 1);
                return Err(FrameError::TooLarge { limit: self.max_frame_bytes });
            }
            let mut line = src.split_to(pos + 1);
            line.truncate(pos);
            return Ok(Some(line));
        }
        if src.len() > self.max_frame_bytes {
            return Err(FrameError::TooLarge { limit: self.max_frame_bytes });
        }
        Ok(None)
    }
}

impl Encoder<&[u8]> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_bytes {
            return Err(FrameError::TooLarge { limit: self.max_frame_bytes });
        }
        dst.reserve(item.len() + 1);
        dst.put_slice(item);
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Read one newline-delimited frame from an async buffered reader,
/// enforcing `max_frame_bytes`. Returns `Ok(None)` on clean EOF.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() > max_frame_bytes {
        return Err(FrameError::TooLarge { limit: max_frame_bytes });
    }
    Ok(Some(buf))
}

/// Write one newline-delimited frame to an async writer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_frame_bytes: usize) -> Result<(), FrameError>
where
    W: AsyncWriteExt + Unpin,
{
    if payload.len() > max_frame_bytes {
        return Err(FrameError::TooLarge { limit: max_frame_bytes });
    }
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
