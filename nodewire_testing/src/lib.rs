//! Test doubles for driving a [`Client`](nodewire::client::Client) against
//! a scripted node.
//!
//! [`MockNode`] listens on a loopback port and hands out
//! [`NodeConnection`]s that speak the length-prefixed JSON protocol. The
//! [`Recorder`] implements both handler traits and forwards every callback
//! to an [`Events`] queue that tests can await.
//!
//! ```no_run
//! use nodewire::client::Client;
//! use nodewire_testing::{MockNode, recorder};
//!
//! # async fn example() -> std::io::Result<()> {
//! let node = MockNode::bind().await?;
//! let (handler, mut events) = recorder();
//! let client = Client::new("127.0.0.1", node.port(), handler);
//! client.connect().await;
//! let mut conn = node.accept().await?;
//! client.activate(client.next_request_id(), "key");
//! conn.accept_activation(serde_json::json!({})).await;
//! events.wait_for_state(nodewire::ConnectionState::Active).await;
//! # Ok(())
//! # }
//! ```

pub mod mock_node;
pub mod recorder;

pub use mock_node::{MockNode, NodeConnection, WAIT};
pub use recorder::{Event, Events, Recorder, RecordingSink, recorder};
