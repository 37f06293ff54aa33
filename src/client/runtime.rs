//! Connection runtime for [`Client`].
//!
//! A connected client owns two tasks. The receive task reads frames, answers
//! liveness probes and dispatches everything to the [`ClientHandler`]. The
//! write task is the only owner of the socket's write half and drains an
//! outbound queue, so frames from different callers never interleave and
//! commands never block. Both tasks stop when the session's cancellation
//! token fires, and the socket closes once they have finished.

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    io::AsyncWrite,
    net::{
        TcpSocket,
        TcpStream,
        lookup_host,
        tcp::OwnedReadHalf,
    },
    select,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::{ClientConfig, ClientError, ClientHandler};
use crate::{
    codec::Frame,
    correlation::PendingRequests,
    message::{self, Message, Request, RequestId, Response, method, timestamp_params},
    metrics::{self, Direction, DropReason},
    panic::guard,
    state::{ConnectionState, StateMachine},
    transport::{self, FrameReader, FrameWriter, TransportError},
};

/// Asynchronous JSON-RPC client for a media node.
///
/// `Client` is a cheap handle; clones share one connection. Lifecycle calls
/// ([`connect`](Self::connect), [`disconnect`](Self::disconnect)) are async
/// and serialised against each other. Commands are synchronous: they encode
/// the request, register it for correlation and queue it for the write task.
/// A command issued in the wrong state is skipped without error.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use nodewire::{
///     client::{Client, ClientHandler},
///     message::{Request, Response},
/// };
///
/// struct Quiet;
///
/// impl ClientHandler for Quiet {
///     fn process_response(&self, _request: Option<&Request>, _response: &Response) {}
///     fn process_request(&self, _request: &Request) {}
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), nodewire::client::ClientError> {
/// let client = Client::new("localhost", 6317, Arc::new(Quiet));
/// client.try_connect().await?;
/// client.activate(client.next_request_id(), "licence-key");
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(super) inner: Arc<ClientInner>,
}

/// Non-owning reference to a [`Client`].
#[derive(Clone, Debug)]
pub struct WeakClient {
    inner: Weak<ClientInner>,
}

impl WeakClient {
    /// Recover the client if any handle to it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

pub(super) struct ClientInner {
    host: String,
    port: u16,
    config: ClientConfig,
    handler: Arc<dyn ClientHandler>,
    state: StateMachine,
    pending: PendingRequests,
    next_seq: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    session: tokio::sync::Mutex<Option<Session>>,
}

struct Session {
    shutdown: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Session {
    async fn stop(self) {
        self.shutdown.cancel();
        for (task, handle) in [("receive", self.reader), ("write", self.writer)] {
            if let Err(e) = handle.await {
                warn!(task, error = %e, "connection task ended abnormally");
            }
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.shutdown.cancel();
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("state", &self.inner.state.current())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a disconnected client with the default configuration.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, handler: Arc<dyn ClientHandler>) -> Self {
        Self::with_config(host, port, handler, ClientConfig::default())
    }

    /// Create a disconnected client with an explicit configuration.
    #[must_use]
    pub fn with_config(
        host: impl Into<String>,
        port: u16,
        handler: Arc<dyn ClientHandler>,
        config: ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                host: host.into(),
                port,
                config,
                handler,
                state: StateMachine::new(),
                pending: PendingRequests::new(),
                next_seq: AtomicU64::new(0),
                outbound: Mutex::new(None),
                session: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Open the connection, logging any failure.
    ///
    /// Does nothing if a connection is already open. On failure the state
    /// stays [`ConnectionState::Init`] and no tasks are running.
    pub async fn connect(&self) {
        if let Err(e) = self.try_connect().await {
            metrics::inc_errors();
            warn!(
                host = %self.inner.host,
                port = self.inner.port,
                error = %e,
                error_type = e.error_type(),
                "failed to connect to node"
            );
        }
    }

    /// Open the connection and report why it failed.
    ///
    /// On success the state is [`ConnectionState::Connected`] and the handler
    /// has been told so before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the host does not resolve, the socket
    /// cannot be opened, or the attempt exceeds the connect timeout.
    pub async fn try_connect(&self) -> Result<(), ClientError> {
        let mut session = self.inner.session.lock().await;
        if self.inner.state.current().is_connected() {
            debug!("connect ignored: already connected");
            return Ok(());
        }
        // The peer may have closed the previous connection; reap its tasks.
        if let Some(stale) = session.take() {
            stale.stop().await;
        }
        let stream = self.inner.open_stream().await?;
        *session = Some(start_session(&self.inner, stream));
        Ok(())
    }

    /// Close the connection and wait for both connection tasks to finish.
    ///
    /// Pending requests are discarded and the state returns to
    /// [`ConnectionState::Init`]. Calling this while disconnected is a
    /// no-op.
    pub async fn disconnect(&self) {
        let mut session = self.inner.session.lock().await;
        let Some(active) = session.take() else {
            debug!("disconnect ignored: not connected");
            return;
        };
        active.stop().await;
        self.inner.teardown();
        info!(host = %self.inner.host, port = self.inner.port, "disconnected from node");
    }

    /// Current connection state, without blocking.
    #[must_use]
    pub fn status(&self) -> ConnectionState { self.inner.state.current() }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Mint the next request identifier.
    ///
    /// Identifiers come from a per-client counter starting at zero and are
    /// never reused for the life of the client.
    #[must_use]
    pub fn next_request_id(&self) -> RequestId {
        RequestId::from_seq(self.inner.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of requests still awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.inner.pending.len() }

    /// Host this client connects to.
    #[must_use]
    pub fn host(&self) -> &str { &self.inner.host }

    /// Port this client connects to.
    #[must_use]
    pub fn port(&self) -> u16 { self.inner.port }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.inner.config }

    /// Create a handle that does not keep the client alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl ClientInner {
    async fn open_stream(&self) -> Result<TcpStream, ClientError> {
        let limit = self.config.connect_timeout_value();
        timeout(limit, self.dial())
            .await
            .map_err(|_| ClientError::Timeout(limit))?
    }

    async fn dial(&self) -> Result<TcpStream, ClientError> {
        let mut last_error = None;
        for addr in lookup_host((self.host.as_str(), self.port)).await? {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            self.config.socket_options_value().apply(&socket)?;
            match socket.connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.map_or_else(
            || ClientError::Unresolved {
                host: self.host.clone(),
                port: self.port,
            },
            ClientError::Io,
        ))
    }

    fn outbound_slot(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Bytes>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, transition: impl FnOnce(&StateMachine) -> bool) {
        if !transition(&self.state) {
            return;
        }
        let state = self.state.current();
        info!(%state, "connection state changed");
        guard("on_connection_state_changed", || {
            self.handler.on_connection_state_changed(state);
        });
    }

    fn teardown(&self) {
        if self.outbound_slot().take().is_some() {
            metrics::dec_connections();
        }
        self.pending.clear();
        self.set_state(StateMachine::disconnected);
    }

    fn connection_lost(&self, error: &TransportError) {
        match error {
            TransportError::Disconnected => info!("node closed the connection"),
            other => {
                metrics::inc_errors();
                warn!(error = %other, "connection to node failed");
            }
        }
        self.teardown();
    }

    pub(super) fn send_request(&self, request: Request) {
        let payload = match request.encode() {
            Ok(payload) => payload,
            Err(e) => {
                metrics::inc_errors();
                warn!(method = %request.method, error = %e, "failed to encode request");
                return;
            }
        };
        let Some(id) = request.id.clone() else {
            self.enqueue(payload);
            return;
        };
        // Register first so a fast response always finds its request.
        self.pending.register(id.clone(), request);
        if !self.enqueue(payload) {
            let _ = self.pending.resolve(&id);
        }
    }

    fn send_response(&self, response: &Response) {
        match response.encode() {
            Ok(payload) => {
                self.enqueue(payload);
            }
            Err(e) => {
                metrics::inc_errors();
                warn!(request_id = ?response.id, error = %e, "failed to encode response");
            }
        }
    }

    fn enqueue(&self, payload: Vec<u8>) -> bool {
        let max = self.config.max_frame_length_value();
        if payload.len() >= max {
            metrics::inc_errors();
            warn!(size = payload.len(), max, "refusing to send oversized frame");
            return false;
        }
        let slot = self.outbound_slot();
        let Some(tx) = slot.as_ref() else {
            debug!("not connected; outbound frame dropped");
            return false;
        };
        if tx.send(Bytes::from(payload)).is_err() {
            debug!("write task stopped; outbound frame dropped");
            return false;
        }
        true
    }

    fn dispatch(&self, payload: &[u8]) {
        metrics::inc_frames(Direction::Inbound);
        match message::decode(payload) {
            Ok(Message::Request(request)) => self.on_request(&request),
            Ok(Message::Response(response)) => self.on_response(&response),
            Err(e) => {
                metrics::inc_dropped(DropReason::Malformed);
                warn!(error = %e, size = payload.len(), "dropping malformed message");
            }
        }
    }

    fn on_request(&self, request: &Request) {
        if request.method == method::PING_CLIENT {
            self.pong(request);
        }
        guard("process_request", || self.handler.process_request(request));
    }

    fn pong(&self, ping: &Request) {
        if !self.state.current().is_active() {
            debug!("ping ignored: connection not active");
            return;
        }
        let Some(id) = ping.id.clone() else {
            debug!("ping ignored: no request id");
            return;
        };
        self.send_response(&Response::message(Some(id), timestamp_params()));
    }

    fn on_response(&self, response: &Response) {
        let request = response.id.as_ref().and_then(|id| self.pending.resolve(id));
        if request.is_none() {
            debug!(request_id = ?response.id, "response does not match a pending request");
        }
        if let Some(original) = &request
            && original.method == method::ACTIVATE
            && response.is_message()
        {
            self.set_state(StateMachine::activated);
        }
        guard("process_response", || {
            self.handler.process_response(request.as_ref(), response);
        });
    }
}

fn start_session(inner: &Arc<ClientInner>, stream: TcpStream) -> Session {
    let peer = stream.peer_addr().ok();
    let (reader, writer) = transport::split(stream, inner.config.max_frame_length_value());
    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    inner.pending.clear();
    *inner.outbound_slot() = Some(tx);
    metrics::inc_connections();
    info!(?peer, "connected to node");
    inner.set_state(StateMachine::connected);

    let writer = tokio::spawn(
        write_loop(Arc::downgrade(inner), writer, rx, shutdown.clone()).in_current_span(),
    );
    let reader = tokio::spawn(
        receive_loop(
            Arc::downgrade(inner),
            reader,
            shutdown.clone(),
            inner.config.poll_interval_value(),
        )
        .in_current_span(),
    );
    Session {
        shutdown,
        reader,
        writer,
    }
}

async fn write_loop<W>(
    inner: Weak<ClientInner>,
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let payload = select! {
            biased;
            () = shutdown.cancelled() => break,
            next = outbound.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };
        match writer.send(payload).await {
            Ok(()) => metrics::inc_frames(Direction::Outbound),
            Err(TransportError::Framing(e)) => {
                metrics::inc_errors();
                warn!(error = %e, "outbound frame rejected");
            }
            Err(e) => {
                // A cancelled session is already being torn down by its owner.
                if shutdown.is_cancelled() {
                    break;
                }
                shutdown.cancel();
                if let Some(inner) = inner.upgrade() {
                    inner.connection_lost(&e);
                }
                break;
            }
        }
    }
}

async fn receive_loop(
    inner: Weak<ClientInner>,
    mut reader: FrameReader<OwnedReadHalf>,
    shutdown: CancellationToken,
    poll_interval: Duration,
) {
    loop {
        let received = select! {
            biased;
            () = shutdown.cancelled() => return,
            received = reader.receive(poll_interval) => received,
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match received {
            Ok(None) => {}
            Ok(Some(Frame::Payload(payload))) => inner.dispatch(&payload),
            Ok(Some(Frame::Oversized { size, max })) => {
                metrics::inc_dropped(DropReason::Oversized);
                warn!(size, max, "dropping oversized frame");
            }
            Err(e) => {
                shutdown.cancel();
                inner.connection_lost(&e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio::{io::duplex, net::TcpListener, sync::mpsc};
    use tokio_util::sync::CancellationToken;

    use super::{Client, write_loop};
    use crate::{
        client::ClientHandler,
        message::{Request, Response},
        state::ConnectionState,
        transport::FrameWriter,
    };

    struct Quiet;

    impl ClientHandler for Quiet {
        fn process_response(&self, _request: Option<&Request>, _response: &Response) {}
        fn process_request(&self, _request: &Request) {}
    }

    #[tokio::test]
    async fn failed_write_tears_the_session_down() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let port = listener.local_addr().expect("listener addr").port();
        let client = Client::new("127.0.0.1", port, Arc::new(Quiet));
        client.try_connect().await.expect("connect client");
        let (_peer, _) = listener.accept().await.expect("accept client");
        assert_eq!(client.status(), ConnectionState::Connected);

        let (near, far) = duplex(64);
        drop(far);
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        tx.send(Bytes::from_static(b"{}")).expect("queue payload");
        write_loop(
            Arc::downgrade(&client.inner),
            FrameWriter::new(near, 1024),
            rx,
            shutdown.clone(),
        )
        .await;

        assert!(shutdown.is_cancelled());
        assert_eq!(client.status(), ConnectionState::Init);
        assert_eq!(client.pending_requests(), 0);

        client.ping_service(client.next_request_id());
        assert_eq!(client.pending_requests(), 0);
        client.disconnect().await;
    }
}
