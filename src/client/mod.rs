//! Client for a media node's JSON-RPC control channel.
//!
//! [`Client`] owns one TCP connection, tracks its [`ConnectionState`]
//! (`Init -> Connected -> Active`), correlates responses with the requests
//! that caused them, answers the node's liveness probes and hands every
//! inbound message to a [`ClientHandler`].
//!
//! [`ConnectionState`]: crate::state::ConnectionState

mod commands;
mod config;
mod error;
mod handler;
mod runtime;

pub use commands::ServiceDirectories;
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL, SocketOptions};
pub use error::ClientError;
pub use handler::ClientHandler;
pub use runtime::{Client, WeakClient};
