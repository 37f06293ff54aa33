//! Callbacks through which the client reports inbound traffic.
//!
//! The receive task invokes these synchronously, one message at a time and
//! in wire order. Implementations must return promptly: while a callback
//! runs, no further frames are read and liveness probes go unanswered.

use crate::{
    message::{Request, Response},
    state::ConnectionState,
};

/// Observer of a [`Client`](super::Client)'s inbound traffic and state.
///
/// # Examples
///
/// ```
/// use nodewire::{
///     client::ClientHandler,
///     message::{Request, Response},
/// };
///
/// struct Log;
///
/// impl ClientHandler for Log {
///     fn process_response(&self, request: Option<&Request>, response: &Response) {
///         let method = request.map_or("<unknown>", |req| req.method.as_str());
///         tracing::info!(method, ok = response.is_message(), "response");
///     }
///
///     fn process_request(&self, request: &Request) {
///         tracing::info!(method = %request.method, "request");
///     }
/// }
/// ```
pub trait ClientHandler: Send + Sync + 'static {
    /// A response arrived. `request` is the original request when the id
    /// matched a pending entry, or `None` when the context is unknown.
    fn process_response(&self, request: Option<&Request>, response: &Response);

    /// A request or notification arrived from the node.
    fn process_request(&self, request: &Request);

    /// The connection state changed.
    fn on_connection_state_changed(&self, _state: ConnectionState) {}
}
