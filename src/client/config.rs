//! Client configuration and socket options.

use std::{io, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

use crate::codec::{DEFAULT_MAX_FRAME_LENGTH, clamp_frame_length};

/// Default interval at which background tasks re-check for shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket options applied before connecting.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use nodewire::client::SocketOptions;
///
/// let options = SocketOptions::default()
///     .nodelay(true)
///     .keepalive(Some(Duration::from_secs(30)));
/// assert_ne!(options, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<KeepAliveSetting>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeepAliveSetting {
    Disabled,
    Duration(Duration),
}

impl SocketOptions {
    /// Configure `TCP_NODELAY` behaviour on the socket.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Configure `SO_KEEPALIVE`; `None` disables it.
    #[must_use]
    pub fn keepalive(mut self, duration: Option<Duration>) -> Self {
        self.keepalive = Some(match duration {
            Some(value) => KeepAliveSetting::Duration(value),
            None => KeepAliveSetting::Disabled,
        });
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        match self.keepalive {
            Some(KeepAliveSetting::Duration(duration)) => {
                socket.set_keepalive(true)?;
                let config = TcpKeepalive::new().with_time(duration);
                SockRef::from(socket).set_tcp_keepalive(&config)?;
            }
            Some(KeepAliveSetting::Disabled) => socket.set_keepalive(false)?,
            None => {}
        }
        Ok(())
    }
}

/// Tunables for a [`Client`](super::Client).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use nodewire::client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .max_frame_length(16 * 1024)
///     .poll_interval(Duration::from_millis(250));
/// assert_eq!(config.max_frame_length_value(), 16 * 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    max_frame_length: usize,
    poll_interval: Duration,
    connect_timeout: Duration,
    socket_options: SocketOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            socket_options: SocketOptions::default().nodelay(true),
        }
    }
}

impl ClientConfig {
    /// Largest frame accepted or sent; clamped to the codec's bounds.
    #[must_use]
    pub fn max_frame_length(mut self, value: usize) -> Self {
        self.max_frame_length = clamp_frame_length(value);
        self
    }

    /// How often the background tasks wake to check for shutdown.
    #[must_use]
    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    /// Bound on establishing the TCP connection.
    #[must_use]
    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Replace the socket options.
    #[must_use]
    pub fn socket_options(mut self, value: SocketOptions) -> Self {
        self.socket_options = value;
        self
    }

    /// Configured maximum frame length.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    /// Configured poll interval.
    #[must_use]
    pub const fn poll_interval_value(&self) -> Duration { self.poll_interval }

    /// Configured connect timeout.
    #[must_use]
    pub const fn connect_timeout_value(&self) -> Duration { self.connect_timeout }

    /// Configured socket options.
    #[must_use]
    pub const fn socket_options_value(&self) -> &SocketOptions { &self.socket_options }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientConfig, SocketOptions};
    use crate::codec::{DEFAULT_MAX_FRAME_LENGTH, MIN_FRAME_LENGTH};

    #[test]
    fn defaults_match_node_limits() {
        let config = ClientConfig::default();
        assert_eq!(config.max_frame_length_value(), DEFAULT_MAX_FRAME_LENGTH);
        assert_eq!(config.poll_interval_value(), Duration::from_secs(1));
    }

    #[test]
    fn max_frame_length_is_clamped() {
        let config = ClientConfig::default().max_frame_length(1);
        assert_eq!(config.max_frame_length_value(), MIN_FRAME_LENGTH);
    }

    #[test]
    fn socket_options_apply_to_socket() {
        let socket = tokio::net::TcpSocket::new_v4().expect("create socket");
        let options = SocketOptions::default()
            .nodelay(true)
            .keepalive(Some(Duration::from_secs(30)));

        options.apply(&socket).expect("apply options");

        assert!(socket.nodelay().expect("read nodelay"));
        assert!(socket.keepalive().expect("read keepalive"));
    }
}
