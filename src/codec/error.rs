//! Error types for the framing layer.
//!
//! Framing errors describe problems with frame boundaries on the wire, EOF
//! errors distinguish a clean close from a peer vanishing mid-frame, and
//! [`CodecError`] wraps both together with plain I/O failures.
//!
//! # Recovery
//!
//! - Oversized frames are dropped and the connection stays up.
//! - Every other error ends the connection generation.

use std::io;

use thiserror::Error;

/// Framing-level errors raised while encoding or delimiting frames.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Frame length is at or above the configured maximum.
    #[error("frame exceeds max length: {size} >= {max}")]
    OversizedFrame {
        /// Length declared by (or requested for) the frame.
        size: usize,
        /// Configured maximum frame length.
        max: usize,
    },
}

/// EOF conditions observed while a frame was only partially read.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the stream after sending part of a payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload length declared by the header.
        expected: usize,
    },

    /// The peer closed the stream while the length prefix was being read.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },
}

/// Top-level codec error.
///
/// # Examples
///
/// ```
/// use nodewire::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::OversizedFrame {
///     size: 9000,
///     max: 8192,
/// });
/// assert!(!err.should_disconnect());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame boundary problem.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream ended inside a frame.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns true if the connection cannot continue after this error.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        !matches!(self, Self::Framing(FramingError::OversizedFrame { .. }))
    }

    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use super::{CodecError, EofError, FramingError};

    #[rstest]
    #[case::oversized(
        CodecError::Framing(FramingError::OversizedFrame { size: 10, max: 8 }),
        false,
        "framing"
    )]
    #[case::mid_frame(
        CodecError::Eof(EofError::MidFrame { bytes_received: 1, expected: 4 }),
        true,
        "eof"
    )]
    #[case::io(CodecError::Io(io::Error::other("reset")), true, "io")]
    fn classifies_errors(
        #[case] err: CodecError,
        #[case] disconnect: bool,
        #[case] category: &str,
    ) {
        assert_eq!(err.should_disconnect(), disconnect);
        assert_eq!(err.error_type(), category);
    }

    #[test]
    fn eof_errors_convert_to_unexpected_eof() {
        let err: io::Error = CodecError::Eof(EofError::MidHeader {
            bytes_received: 2,
            header_size: 4,
        })
        .into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
