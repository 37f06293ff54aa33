//! A loopback TCP peer that plays the node's side of the protocol.

use std::{io, net::SocketAddr, time::Duration};

use nodewire::{
    codec::{DEFAULT_MAX_FRAME_LENGTH, Frame, write_length_prefix},
    transport::{FrameReader, TransportError},
};
use serde_json::{Value, json};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpListener,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

/// Default deadline for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(2);

/// Listener standing in for a media node.
pub struct MockNode {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockNode {
    /// Bind to an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Returns any error from binding the listener.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// Address the node listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Port the node listens on.
    #[must_use]
    pub fn port(&self) -> u16 { self.addr.port() }

    /// Wait for the client to connect.
    ///
    /// # Errors
    ///
    /// Returns any error from accepting the connection.
    pub async fn accept(&self) -> io::Result<NodeConnection> {
        let (stream, _) = self.listener.accept().await?;
        let (read_half, write_half) = stream.into_split();
        Ok(NodeConnection {
            reader: FrameReader::new(read_half, DEFAULT_MAX_FRAME_LENGTH),
            writer: write_half,
        })
    }
}

/// The node's end of one client connection.
///
/// Helpers panic on transport failures; they are meant for tests.
pub struct NodeConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl NodeConnection {
    /// Next JSON message from the client, or `None` if nothing arrives
    /// within `wait`.
    ///
    /// # Panics
    ///
    /// Panics if the client disconnects or sends invalid JSON.
    pub async fn recv(&mut self, wait: Duration) -> Option<Value> {
        match self.reader.receive(wait).await.expect("read from client") {
            Some(Frame::Payload(bytes)) => {
                Some(serde_json::from_slice(&bytes).expect("client sent valid JSON"))
            }
            Some(Frame::Oversized { size, max }) => {
                panic!("client sent an oversized frame ({size} >= {max})")
            }
            None => None,
        }
    }

    /// Next JSON message from the client.
    ///
    /// # Panics
    ///
    /// Panics if nothing arrives within [`WAIT`].
    pub async fn recv_message(&mut self) -> Value {
        self.recv(WAIT).await.expect("client message within deadline")
    }

    /// Assert that the client sends nothing for `wait`.
    ///
    /// # Panics
    ///
    /// Panics if a frame arrives.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Some(message) = self.recv(wait).await {
            panic!("expected no traffic, got {message}");
        }
    }

    /// Returns `true` once the client has closed the connection.
    pub async fn closed(&mut self, wait: Duration) -> bool {
        matches!(
            self.reader.receive(wait).await,
            Err(TransportError::Disconnected)
        )
    }

    /// Write raw bytes with no framing.
    ///
    /// # Panics
    ///
    /// Panics if the write fails.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write to client");
    }

    /// Write one frame carrying `payload`, whatever its size.
    ///
    /// # Panics
    ///
    /// Panics if the payload length does not fit the prefix or the write
    /// fails.
    pub async fn send_payload(&mut self, payload: &[u8]) {
        let len = u32::try_from(payload.len()).expect("payload fits a u32 prefix");
        let mut frame = write_length_prefix(len).to_vec();
        frame.extend_from_slice(payload);
        self.send_raw(&frame).await;
    }

    /// Write one frame carrying `message`.
    ///
    /// # Panics
    ///
    /// Panics if the write fails.
    pub async fn send_json(&mut self, message: &Value) {
        let bytes = serde_json::to_vec(message).expect("serialise JSON");
        self.send_payload(&bytes).await;
    }

    /// Answer `request` with a success response.
    pub async fn reply(&mut self, request: &Value, result: Value) {
        self.send_json(&json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            .await;
    }

    /// Answer `request` with an error response.
    pub async fn reply_error(&mut self, request: &Value, code: i64, message: &str) {
        self.send_json(&json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": code, "message": message},
        }))
        .await;
    }

    /// Send a request or notification to the client.
    pub async fn request(&mut self, id: Option<&str>, method: &str, params: Value) {
        let mut message = json!({"jsonrpc": "2.0", "method": method, "params": params});
        if let Some(id) = id {
            message["id"] = Value::from(id);
        }
        self.send_json(&message).await;
    }

    /// Read the activation request and accept it with `result`.
    ///
    /// # Panics
    ///
    /// Panics if the next message is not an activation request.
    pub async fn accept_activation(&mut self, result: Value) -> Value {
        let request = self.recv_message().await;
        assert_eq!(request["method"], "activate_request", "got {request}");
        self.reply(&request, result).await;
        request
    }
}
