//! Output relay from child pipes to a streaming response body.
//!
//! Each chunk read from the child becomes one body frame, which hyper
//! writes to the socket as soon as it is polled. There is no buffering
//! between the child and the peer beyond the bounded channel.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::DropGuard;
use tracing::{debug, trace};

/// Number of chunks buffered between the pumps and the body.
pub const RELAY_CAPACITY: usize = 64;

/// Buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 4096;

/// Create a relay whose read side holds `guard`.
///
/// Dropping the returned [`RelayStream`] (which is what happens when the
/// caller disconnects) drops the guard and cancels the execution.
pub fn channel(guard: DropGuard) -> (OutputRelay, RelayStream) {
    let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
    (
        OutputRelay { tx },
        RelayStream { rx, _guard: guard },
    )
}

/// Write side of the relay. Cheap to clone; the body ends once every
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct OutputRelay {
    tx: mpsc::Sender<Bytes>,
}

impl OutputRelay {
    /// Forward one chunk to the peer.
    ///
    /// Returns `false` once the peer is gone. That is not an error: the
    /// caller just stops producing output.
    pub async fn write(&self, chunk: impl Into<Bytes>) -> bool {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(chunk).await.is_ok()
    }

    /// Whether the read side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Spawn a task copying `reader` into the relay until EOF, a read
    /// error, or the peer going away.
    pub fn pump<R>(&self, mut reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let relay = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        trace!("relay: EOF");
                        break;
                    }
                    Ok(n) => {
                        if !relay.write(Bytes::copy_from_slice(&buf[..n])).await {
                            debug!("relay: peer gone");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "relay: read failed");
                        break;
                    }
                }
            }
        })
    }
}

/// Read side of the relay, used as a response body stream.
#[derive(Debug)]
pub struct RelayStream {
    rx: mpsc::Receiver<Bytes>,
    _guard: DropGuard,
}

impl RelayStream {
    /// Turn the stream into a response body.
    pub fn into_body(self) -> Body {
        Body::from_stream(self)
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let token = CancellationToken::new();
        let (relay, mut stream) = channel(token.clone().drop_guard());

        assert!(relay.write("one ").await);
        assert!(relay.write(Bytes::from_static(b"two")).await);
        drop(relay);

        let mut collected = Vec::new();
        while let Some(Ok(chunk)) = stream.next().await {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"one two");
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_and_closes() {
        let token = CancellationToken::new();
        let (relay, stream) = channel(token.clone().drop_guard());

        drop(stream);
        assert!(token.is_cancelled());
        assert!(relay.is_closed());
        assert!(!relay.write("late").await);
    }

    #[tokio::test]
    async fn test_pump_copies_reader() {
        let token = CancellationToken::new();
        let (relay, stream) = channel(token.drop_guard());

        let pump = relay.pump(&b"hello from a pipe"[..]);
        drop(relay);
        pump.await.unwrap();

        let body = axum::body::to_bytes(stream.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello from a pipe");
    }

    #[tokio::test]
    async fn test_empty_write_is_skipped() {
        let token = CancellationToken::new();
        let (relay, mut stream) = channel(token.drop_guard());

        assert!(relay.write(Bytes::new()).await);
        drop(relay);
        assert!(stream.next().await.is_none());
    }
}
