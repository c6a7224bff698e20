//! Byte relay for incremental upstream responses.
//!
//! The relay is format-agnostic: SSE frames and NDJSON records pass through
//! untouched and in order. Each read is forwarded as its own chunk and flushed
//! before the next read, so nothing is held back waiting for more data.

use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::constants::RELAY_CHUNK_SIZE;

/// How a relay ended. None of these are errors for the caller to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Source reached end-of-stream
    Completed,
    /// Destination refused a chunk (client disconnected)
    ClientGone,
    /// Source failed mid-stream; whatever was sent so far stays sent
    UpstreamFailed,
}

/// Copy `source` to `dest` one read at a time, flushing after every chunk.
///
/// Returns as soon as either side fails. The caller owns `source` and is
/// responsible for dropping it to release the upstream connection.
pub async fn relay<R, W>(dest: &mut W, source: &mut R) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    W: Sink<Bytes> + Unpin,
{
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => return RelayOutcome::Completed,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Upstream stream failed mid-relay: {e}");
                return RelayOutcome::UpstreamFailed;
            }
        };

        // `send` is feed + flush
        if dest.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            return RelayOutcome::ClientGone;
        }
    }
}

/// Reader adapter that keeps a copy of every byte read through it.
pub struct TeeReader<R> {
    inner: R,
    captured: Vec<u8>,
}

impl<R> TeeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            captured: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    /// Split into the wrapped reader and everything read so far.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.inner, self.captured)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TeeReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.captured.extend_from_slice(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}
