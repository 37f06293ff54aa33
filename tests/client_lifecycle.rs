//! Integration tests for the client's connection lifecycle.
//!
//! Each test drives a real [`Client`] against a [`MockNode`] on loopback and
//! observes state changes through the recorded handler callbacks.

use std::time::Duration;

use nodewire::{ConnectionState, client::Client};
use nodewire_testing::{Event, MockNode, WAIT, recorder};
use serde_json::json;

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn activate_then_ping_sends_one_timestamped_request() {
    let node = MockNode::bind().await.expect("bind node");
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", node.port(), handler);

    client.connect().await;
    assert_eq!(client.status(), ConnectionState::Connected);
    let mut conn = node.accept().await.expect("accept client");

    client.activate(client.next_request_id(), "key");
    conn.accept_activation(json!({})).await;
    events.wait_for_state(ConnectionState::Active).await;
    assert_eq!(client.status(), ConnectionState::Active);

    client.ping_service(client.next_request_id());

    let ping = conn.recv_message().await;
    assert_eq!(ping["method"], "ping_service");
    assert_eq!(ping["jsonrpc"], "2.0");
    assert!(ping["params"]["timestamp"].is_i64(), "got {ping}");
    conn.expect_silence(QUIET).await;
}

#[tokio::test]
async fn node_closing_the_socket_resets_the_client() {
    let node = MockNode::bind().await.expect("bind node");
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", node.port(), handler);
    client.connect().await;
    let mut conn = node.accept().await.expect("accept client");
    client.activate(client.next_request_id(), "key");
    conn.accept_activation(json!({})).await;
    events.wait_for_state(ConnectionState::Active).await;

    client.stop_stream(client.next_request_id(), "s1");
    let _ = conn.recv_message().await;
    assert_eq!(client.pending_requests(), 1);
    drop(conn);

    events.wait_for_state(ConnectionState::Init).await;
    assert_eq!(client.status(), ConnectionState::Init);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn client_reconnects_after_losing_the_node() {
    let node = MockNode::bind().await.expect("bind node");
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", node.port(), handler);
    client.connect().await;
    let conn = node.accept().await.expect("accept first connection");
    drop(conn);
    events.wait_for_state(ConnectionState::Init).await;

    client.connect().await;
    let mut conn = node.accept().await.expect("accept second connection");
    events.wait_for_state(ConnectionState::Connected).await;

    client.activate(client.next_request_id(), "key");
    conn.accept_activation(json!({})).await;
    events.wait_for_state(ConnectionState::Active).await;
}

#[tokio::test]
async fn disconnect_closes_the_socket() {
    let node = MockNode::bind().await.expect("bind node");
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", node.port(), handler);
    client.connect().await;
    let mut conn = node.accept().await.expect("accept client");

    client.disconnect().await;

    assert!(conn.closed(WAIT).await, "node should observe the close");
    let states: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Event::State(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states, [ConnectionState::Connected, ConnectionState::Init]);
}

#[tokio::test]
async fn disconnect_from_init_does_nothing() {
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", 9, handler);

    client.disconnect().await;
    client.disconnect().await;

    assert_eq!(client.status(), ConnectionState::Init);
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn second_connect_is_ignored() {
    let node = MockNode::bind().await.expect("bind node");
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", node.port(), handler);
    client.connect().await;
    let _conn = node.accept().await.expect("accept client");

    client.connect().await;

    assert_eq!(events.drain(), [Event::State(ConnectionState::Connected)]);
}

#[tokio::test]
async fn failed_connect_stays_in_init() {
    let node = MockNode::bind().await.expect("bind node");
    let port = node.port();
    drop(node);
    let (handler, mut events) = recorder();
    let client = Client::new("127.0.0.1", port, handler);

    client.connect().await;

    assert_eq!(client.status(), ConnectionState::Init);
    assert!(events.try_next().is_none());
    client.ping_service(client.next_request_id());
    assert_eq!(client.pending_requests(), 0);
}
