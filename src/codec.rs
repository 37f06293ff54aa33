//! Length-prefixed framing for the node control channel.
//!
//! Every message on the wire is a 4-byte big-endian length followed by that
//! many bytes of UTF-8 JSON. [`FrameCodec`] splits a byte stream into
//! [`Frame`]s and wraps outgoing payloads with their prefix.
//!
//! A declared length at or above the configured maximum does not poison the
//! stream: the decoder reports a [`Frame::Oversized`] marker once, discards
//! the advertised payload as it arrives and resumes at the next frame
//! boundary.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Minimum accepted value for a configured maximum frame length.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Upper bound for a configured maximum frame length (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Default maximum frame length (8 KiB), matching the nodes' packet size.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024;

/// Length prefix header size (4 bytes for big-endian u32).
pub const LENGTH_HEADER_SIZE: usize = 4;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Serialise a frame length in network byte order.
#[must_use]
pub fn write_length_prefix(value: u32) -> [u8; LENGTH_HEADER_SIZE] {
    #[allow(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order frame length.
#[must_use]
pub fn read_length_prefix(bytes: [u8; LENGTH_HEADER_SIZE]) -> u32 {
    #[allow(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes(bytes)
}

/// A unit produced by the decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A complete payload.
    Payload(Bytes),
    /// A frame whose declared length breached the maximum. Its payload is
    /// being discarded.
    Oversized {
        /// Declared payload length.
        size: usize,
        /// Configured maximum frame length.
        max: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    Head,
    Payload(usize),
    Skip { size: usize, remaining: usize },
}

/// Codec for 4-byte length-prefixed frames.
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use nodewire::codec::{Frame, FrameCodec};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = FrameCodec::default();
/// let mut buf = BytesMut::new();
/// codec
///     .encode(Bytes::from_static(b"{}"), &mut buf)
///     .expect("encode frame");
/// assert_eq!(&buf[..4], &[0, 0, 0, 2]);
/// let frame = codec.decode(&mut buf).expect("decode frame");
/// assert_eq!(frame, Some(Frame::Payload(Bytes::from_static(b"{}"))));
/// ```
#[derive(Clone, Debug)]
pub struct FrameCodec {
    max_frame_length: usize,
    state: DecodeState,
}

impl FrameCodec {
    /// Construct a codec with a maximum frame length, clamped to
    /// [`MIN_FRAME_LENGTH`]..=[`MAX_FRAME_LENGTH`].
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: clamp_frame_length(max_frame_length),
            state: DecodeState::Head,
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH) }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::Head => {
                    let Some(header) = src
                        .get(..LENGTH_HEADER_SIZE)
                        .and_then(|slice| <[u8; LENGTH_HEADER_SIZE]>::try_from(slice).ok())
                    else {
                        src.reserve(LENGTH_HEADER_SIZE - src.len());
                        return Ok(None);
                    };
                    let size = read_length_prefix(header) as usize;
                    src.advance(LENGTH_HEADER_SIZE);
                    if size >= self.max_frame_length {
                        self.state = DecodeState::Skip {
                            size,
                            remaining: size,
                        };
                        return Ok(Some(Frame::Oversized {
                            size,
                            max: self.max_frame_length,
                        }));
                    }
                    self.state = DecodeState::Payload(size);
                }
                DecodeState::Payload(size) => {
                    if src.len() < size {
                        src.reserve(size - src.len());
                        return Ok(None);
                    }
                    self.state = DecodeState::Head;
                    return Ok(Some(Frame::Payload(src.split_to(size).freeze())));
                }
                DecodeState::Skip { size, remaining } => {
                    let discarded = remaining.min(src.len());
                    src.advance(discarded);
                    let remaining = remaining - discarded;
                    if remaining > 0 {
                        self.state = DecodeState::Skip { size, remaining };
                        return Ok(None);
                    }
                    self.state = DecodeState::Head;
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        let err = match self.state {
            DecodeState::Head if src.is_empty() => return Ok(None),
            DecodeState::Head => EofError::MidHeader {
                bytes_received: src.len(),
                header_size: LENGTH_HEADER_SIZE,
            },
            DecodeState::Payload(expected) => EofError::MidFrame {
                bytes_received: src.len(),
                expected,
            },
            DecodeState::Skip { size, remaining } => EofError::MidFrame {
                bytes_received: size - remaining,
                expected: size,
            },
        };
        log::debug!("stream ended inside a frame: {err}");
        src.clear();
        self.state = DecodeState::Head;
        Err(CodecError::Eof(err).into())
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let oversized = || {
            CodecError::Framing(FramingError::OversizedFrame {
                size: item.len(),
                max: self.max_frame_length,
            })
        };
        if item.len() >= self.max_frame_length {
            return Err(oversized().into());
        }
        let len = u32::try_from(item.len()).map_err(|_| io::Error::from(oversized()))?;
        dst.reserve(LENGTH_HEADER_SIZE + item.len());
        dst.put_slice(&write_length_prefix(len));
        dst.put_slice(&item);
        Ok(())
    }
}
