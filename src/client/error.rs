//! Error types for node client operations.

use std::{io, time::Duration};

/// Errors emitted while opening a connection to the node.
///
/// Everything after the connection is established is reported through
/// logs and the connection state rather than as an error value.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The host name did not resolve to any address.
    #[error("no address found for {host}:{port}")]
    Unresolved {
        /// Host that failed to resolve.
        host: String,
        /// Port that was requested.
        port: u16,
    },
    /// Transport error while resolving or connecting.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The connection attempt did not finish in time.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Unresolved { .. } => "unresolved",
            Self::Io(_) => "io",
            Self::Timeout(_) => "timeout",
        }
    }
}
