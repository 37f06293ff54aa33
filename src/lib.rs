#![doc(html_root_url = "https://docs.rs/nodewire/latest")]
//! Asynchronous JSON-RPC client for media streaming nodes.
//!
//! A node is controlled over one TCP connection carrying 4-byte big-endian
//! length-prefixed JSON-RPC 2.0 messages. The crate is layered bottom-up:
//!
//! - [`codec`] frames and unframes bytes;
//! - [`message`] encodes and decodes JSON-RPC requests and responses;
//! - [`transport`] reads and writes whole frames over a socket;
//! - [`correlation`] pairs responses with the requests that caused them;
//! - [`state`] tracks the `INIT -> CONNECTED -> ACTIVE` lifecycle;
//! - [`client`] ties these together behind a typed command API;
//! - [`service`] binds a client to service settings and routes the node's
//!   reports to application callbacks.

pub mod client;
pub mod codec;
pub mod correlation;
pub mod message;
pub mod metrics;
pub mod panic;
pub mod service;
pub mod state;
pub mod transport;

pub use client::{Client, ClientConfig, ClientError, ClientHandler};
pub use codec::{Frame, FrameCodec};
pub use message::{Message, Request, RequestId, Response, RpcError};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_DROPPED, FRAMES_PROCESSED};
pub use service::{ServiceClient, ServiceMonitor, ServiceSettings, StreamHandler};
pub use state::ConnectionState;
