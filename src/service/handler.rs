//! Callbacks for service-level events and the outbound push channel.

use serde_json::Value;

use crate::state::ConnectionState;

/// Receiver of decoded service events.
///
/// Called on the client's receive task, in wire order. Params are passed
/// through as sent by the node; a request without params delivers
/// [`Value::Null`].
pub trait StreamHandler: Send + Sync + 'static {
    /// A `statistic_stream` report arrived.
    fn on_stream_statistic_received(&self, params: &Value);

    /// A `changed_source_stream` report arrived.
    fn on_stream_sources_changed(&self, params: &Value);

    /// A `statistic_service` report arrived, or activation succeeded.
    fn on_service_statistic_received(&self, params: &Value);

    /// A `status_stream` report arrived.
    fn on_stream_status(&self, params: &Value);

    /// The connection state changed.
    fn on_client_state_changed(&self, state: ConnectionState);
}

/// Outbound push channel towards connected dashboards.
pub trait NotificationSink: Send + Sync + 'static {
    /// Publish `payload` on `channel`.
    fn emit(&self, channel: &str, payload: Value);
}
