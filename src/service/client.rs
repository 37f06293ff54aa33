//! Service-level wrapper around [`Client`].

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use super::{ServiceSettings, StreamHandler, settings::stream_log_path};
use crate::{
    client::{Client, ClientConfig, ClientError, ClientHandler},
    message::{Request, Response, method},
    state::ConnectionState,
};

/// A [`Client`] bound to one service's settings.
///
/// Request identifiers are minted automatically. A successful activation
/// is followed at once by `prepare_service` with the configured directories,
/// and inbound service events are routed to a [`StreamHandler`].
pub struct ServiceClient {
    client: Client,
    settings: ServiceSettings,
    handler: Arc<dyn StreamHandler>,
}

struct Bridge(Weak<ServiceClient>);

impl ClientHandler for Bridge {
    fn process_response(&self, request: Option<&Request>, response: &Response) {
        if let Some(service) = self.0.upgrade() {
            service.on_response(request, response);
        }
    }

    fn process_request(&self, request: &Request) {
        if let Some(service) = self.0.upgrade() {
            service.on_request(request);
        }
    }

    fn on_connection_state_changed(&self, state: ConnectionState) {
        if let Some(service) = self.0.upgrade() {
            service.handler.on_client_state_changed(state);
        }
    }
}

impl ServiceClient {
    /// Create a disconnected service client with the default client
    /// configuration.
    #[must_use]
    pub fn new(settings: ServiceSettings, handler: Arc<dyn StreamHandler>) -> Arc<Self> {
        Self::with_config(settings, handler, ClientConfig::default())
    }

    /// Create a disconnected service client.
    #[must_use]
    pub fn with_config(
        settings: ServiceSettings,
        handler: Arc<dyn StreamHandler>,
        config: ClientConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            client: Client::with_config(
                settings.host.clone(),
                settings.port,
                Arc::new(Bridge(weak.clone())),
                config,
            ),
            settings,
            handler,
        })
    }

    /// Open the connection, logging any failure.
    pub async fn connect(&self) { self.client.connect().await; }

    /// Open the connection and report why it failed.
    ///
    /// # Errors
    ///
    /// See [`Client::try_connect`].
    pub async fn try_connect(&self) -> Result<(), ClientError> { self.client.try_connect().await }

    /// Close the connection.
    pub async fn disconnect(&self) { self.client.disconnect().await; }

    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionState { self.client.status() }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.client.subscribe_state()
    }

    /// Settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &ServiceSettings { &self.settings }

    /// Underlying client.
    #[must_use]
    pub fn client(&self) -> &Client { &self.client }

    /// Activate the session.
    pub fn activate(&self, license_key: &str) {
        self.client.activate(self.client.next_request_id(), license_key);
    }

    /// Probe the service.
    pub fn ping_service(&self) { self.client.ping_service(self.client.next_request_id()); }

    /// Ask the service to stop after `delay` seconds.
    pub fn stop_service(&self, delay: u32) {
        self.client.stop_service(self.client.next_request_id(), delay);
    }

    /// Fetch the log of service `service_id`.
    pub fn get_log_service(&self, service_id: &str) {
        let path = self.settings.service_log_path(service_id);
        self.client.get_log_service(self.client.next_request_id(), &path);
    }

    /// Start a stream.
    pub fn start_stream(&self, config: Value) {
        self.client.start_stream(self.client.next_request_id(), config);
    }

    /// Stop a stream.
    pub fn stop_stream(&self, stream_id: &str) {
        self.client.stop_stream(self.client.next_request_id(), stream_id);
    }

    /// Restart a stream.
    pub fn restart_stream(&self, stream_id: &str) {
        self.client.restart_stream(self.client.next_request_id(), stream_id);
    }

    /// Fetch the log of stream `stream_id`, kept under `feedback_directory`.
    pub fn get_log_stream(&self, stream_id: &str, feedback_directory: &str) {
        let path = stream_log_path(feedback_directory, stream_id);
        self.client.get_log_stream(
            self.client.next_request_id(),
            stream_id,
            feedback_directory,
            &path,
        );
    }

    fn prepare_service(&self) {
        self.client
            .prepare_service(self.client.next_request_id(), &self.settings.directories());
    }

    fn on_response(&self, request: Option<&Request>, response: &Response) {
        let Some(request) = request else {
            return;
        };
        if request.method == method::ACTIVATE && response.is_message() {
            self.prepare_service();
            let result = response.result.as_ref().unwrap_or(&Value::Null);
            self.handler.on_service_statistic_received(result);
        }
    }

    fn on_request(&self, request: &Request) {
        let params = request.params.as_ref().unwrap_or(&Value::Null);
        match request.method.as_str() {
            method::STATISTIC_STREAM => self.handler.on_stream_statistic_received(params),
            method::CHANGED_SOURCE_STREAM => self.handler.on_stream_sources_changed(params),
            method::STATISTIC_SERVICE => self.handler.on_service_statistic_received(params),
            method::STATUS_STREAM => self.handler.on_stream_status(params),
            other => debug!(method = other, "request not routed to the stream handler"),
        }
    }
}
