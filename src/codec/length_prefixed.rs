use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{ReadPacket, WritePacket};

const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;
const HEADER_LEN: usize = 4;

/// A minimal `u32` length-prefixed framing: a 4-byte big-endian length
/// followed by that many body bytes.
///
/// This is the crate's reference codec, used by the demo binary and the
/// integration tests. It buffers reads the same way a RESP connection would:
/// accumulate into a `BytesMut` until a full frame is present, then split it
/// off and keep any trailing bytes for the next call.
#[derive(Debug)]
pub struct LengthPrefixed<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> LengthPrefixed<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }
}

impl<S: AsyncRead + Unpin + Send> ReadPacket for LengthPrefixed<S> {
    async fn read_packet(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(body) = self.try_parse()? {
                return Ok(Some(body));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    debug!("length-prefixed stream closed cleanly");
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid frame",
                ));
            }
        }
    }
}

impl<S> LengthPrefixed<S> {
    /// Tries to split a complete frame off the front of `buffer`.
    ///
    /// Returns `Ok(None)` when fewer bytes than the next frame requires have
    /// been buffered so far.
    fn try_parse(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes(self.buffer[..HEADER_LEN].try_into().unwrap()) as usize;
        if self.buffer.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let body = self.buffer.split_to(len).freeze();
        Ok(Some(body))
    }
}

impl<S: AsyncWrite + Unpin + Send> WritePacket for LengthPrefixed<S> {
    async fn write_packet(&mut self, body: Bytes) -> std::io::Result<()> {
        let len: u32 = body
            .len()
            .try_into()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await
    }
}
