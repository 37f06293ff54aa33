//! Framed transport over a byte stream.
//!
//! [`FrameReader`] and [`FrameWriter`] wrap the two halves of a connection
//! with [`FrameCodec`]. Reads are bounded by a timeout so the caller can
//! check for shutdown between frames; a timeout is not an error. Writes emit
//! one whole frame per call. Each writer has a single owner, which is what
//! keeps frames from different callers from interleaving.

use std::{io, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::{Frame, FrameCodec, FramingError};

/// Errors surfaced by the framed transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the stream, possibly in the middle of a frame.
    #[error("connection closed by peer")]
    Disconnected,
    /// The payload cannot be framed.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// Any other transport failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Reading half of a framed connection.
pub struct FrameReader<R> {
    inner: FramedRead<R, FrameCodec>,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap a reader, rejecting frames at or above `max_frame_length`.
    #[must_use]
    pub fn new(reader: R, max_frame_length: usize) -> Self {
        Self {
            inner: FramedRead::new(reader, FrameCodec::new(max_frame_length)),
        }
    }

    /// Wait up to `wait` for the next frame.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Partial frames stay
    /// buffered across calls, so the stream may fragment a frame arbitrarily.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] when the peer closes the
    /// stream and [`TransportError::Io`] for other read failures.
    pub async fn receive(&mut self, wait: Duration) -> Result<Option<Frame>, TransportError> {
        let Ok(next) = timeout(wait, self.inner.next()).await else {
            return Ok(None);
        };
        match next {
            None => Err(TransportError::Disconnected),
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!(error = %e, "peer closed the stream mid-frame");
                Err(TransportError::Disconnected)
            }
            Some(Err(e)) => Err(TransportError::Io(e)),
        }
    }
}

/// Writing half of a framed connection.
pub struct FrameWriter<W> {
    inner: FramedWrite<W, FrameCodec>,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap a writer, refusing payloads at or above `max_frame_length`.
    #[must_use]
    pub fn new(writer: W, max_frame_length: usize) -> Self {
        Self {
            inner: FramedWrite::new(writer, FrameCodec::new(max_frame_length)),
        }
    }

    /// Write the length prefix and `payload`, then flush.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Framing`] for an oversized payload (nothing
    /// is written) and [`TransportError::Io`] if the write fails.
    pub async fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        let max = self.inner.encoder().max_frame_length();
        if payload.len() >= max {
            return Err(FramingError::OversizedFrame {
                size: payload.len(),
                max,
            }
            .into());
        }
        self.inner.send(payload).await?;
        Ok(())
    }

    /// Access the underlying writer.
    #[must_use]
    pub fn get_ref(&self) -> &W { self.inner.get_ref() }
}

/// Split a TCP stream into framed halves.
#[must_use]
pub fn split(
    stream: TcpStream,
    max_frame_length: usize,
) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
    let (read_half, write_half) = stream.into_split();
    (
        FrameReader::new(read_half, max_frame_length),
        FrameWriter::new(write_half, max_frame_length),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use rstest::rstest;
    use tokio::{
        io::{AsyncWriteExt, duplex},
        time::Instant,
    };

    use super::{FrameReader, FrameWriter, TransportError};
    use crate::codec::{Frame, write_length_prefix};

    const WAIT: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn receive_times_out_without_data() {
        let (_peer, local) = duplex(64);
        let mut reader = FrameReader::new(local, 1024);
        let started = Instant::now();

        let frame = reader.receive(Duration::from_secs(30)).await;

        assert!(matches!(frame, Ok(None)));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_frame_survives_a_poll_timeout() {
        let (mut peer, local) = duplex(64);
        let mut reader = FrameReader::new(local, 1024);
        peer.write_all(&write_length_prefix(2))
            .await
            .expect("write header");
        peer.write_all(b"{").await.expect("write first byte");

        assert!(matches!(reader.receive(Duration::from_secs(1)).await, Ok(None)));

        peer.write_all(b"}").await.expect("write last byte");
        assert_eq!(
            reader.receive(Duration::from_secs(1)).await.expect("read frame"),
            Some(Frame::Payload(Bytes::from_static(b"{}")))
        );
    }

    #[rstest]
    #[case::whole(64)]
    #[case::single_bytes(1)]
    #[case::split_header(3)]
    #[tokio::test]
    async fn receive_reads_exactly_the_declared_length(#[case] chunk: usize) {
        let (mut peer, local) = duplex(256);
        let mut reader = FrameReader::new(local, 1024);
        let payload = br#"{"result":{},"id":"00"}"#;
        let mut wire = write_length_prefix(23).to_vec();
        wire.extend_from_slice(payload);
        wire.extend_from_slice(&write_length_prefix(2));
        wire.extend_from_slice(b"{}");

        let writer = tokio::spawn(async move {
            for piece in wire.chunks(chunk) {
                peer.write_all(piece).await.expect("write fragment");
                tokio::task::yield_now().await;
            }
            peer
        });

        let first = reader.receive(WAIT).await.expect("first frame");
        let second = reader.receive(WAIT).await.expect("second frame");
        let _peer = writer.await.expect("join writer");

        assert_eq!(first, Some(Frame::Payload(Bytes::from_static(payload))));
        assert_eq!(second, Some(Frame::Payload(Bytes::from_static(b"{}"))));
    }

    #[tokio::test]
    async fn receive_reports_disconnect_on_close() {
        let (peer, local) = duplex(64);
        let mut reader = FrameReader::new(local, 1024);
        drop(peer);

        assert!(matches!(
            reader.receive(WAIT).await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn receive_reports_disconnect_on_short_payload() {
        let (mut peer, local) = duplex(64);
        let mut reader = FrameReader::new(local, 1024);
        peer.write_all(&write_length_prefix(10))
            .await
            .expect("write header");
        peer.write_all(b"{}").await.expect("write partial payload");
        drop(peer);

        assert!(matches!(
            reader.receive(WAIT).await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn send_writes_prefix_and_payload() {
        let (local, mut peer) = duplex(64);
        let mut writer = FrameWriter::new(local, 1024);
        let mut reader = FrameReader::new(&mut peer, 1024);

        writer
            .send(Bytes::from_static(b"{\"a\":1}"))
            .await
            .expect("send frame");

        assert_eq!(
            reader.receive(WAIT).await.expect("read frame"),
            Some(Frame::Payload(Bytes::from_static(b"{\"a\":1}")))
        );
    }

    #[tokio::test]
    async fn send_refuses_oversized_payload() {
        let (local, _peer) = duplex(64);
        let mut writer = FrameWriter::new(local, 64);

        let result = writer.send(Bytes::from(vec![b'x'; 64])).await;

        assert!(matches!(result, Err(TransportError::Framing(_))));
    }
}
