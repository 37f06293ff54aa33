//! Handlers that record every callback for later assertions.

use std::sync::{Arc, Mutex};

use nodewire::{
    client::ClientHandler,
    message::{Request, Response},
    service::{NotificationSink, StreamHandler},
    state::ConnectionState,
};
use serde_json::Value;
use tokio::{sync::mpsc, time::timeout};

use crate::WAIT;

/// One recorded callback.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// [`ClientHandler::process_response`].
    Response {
        /// Original request, when known.
        request: Option<Request>,
        /// The response itself.
        response: Response,
    },
    /// [`ClientHandler::process_request`].
    Request(Request),
    /// [`ClientHandler::on_connection_state_changed`].
    State(ConnectionState),
    /// [`StreamHandler::on_stream_statistic_received`].
    StreamStatistic(Value),
    /// [`StreamHandler::on_stream_sources_changed`].
    SourcesChanged(Value),
    /// [`StreamHandler::on_service_statistic_received`].
    ServiceStatistic(Value),
    /// [`StreamHandler::on_stream_status`].
    StreamStatus(Value),
    /// [`StreamHandler::on_client_state_changed`].
    ClientState(ConnectionState),
}

/// Handler forwarding every callback to an [`Events`] queue.
pub struct Recorder(mpsc::UnboundedSender<Event>);

impl Recorder {
    fn record(&self, event: Event) {
        // The test may already have dropped its queue.
        let _ = self.0.send(event);
    }
}

impl ClientHandler for Recorder {
    fn process_response(&self, request: Option<&Request>, response: &Response) {
        self.record(Event::Response {
            request: request.cloned(),
            response: response.clone(),
        });
    }

    fn process_request(&self, request: &Request) { self.record(Event::Request(request.clone())); }

    fn on_connection_state_changed(&self, state: ConnectionState) {
        self.record(Event::State(state));
    }
}

impl StreamHandler for Recorder {
    fn on_stream_statistic_received(&self, params: &Value) {
        self.record(Event::StreamStatistic(params.clone()));
    }

    fn on_stream_sources_changed(&self, params: &Value) {
        self.record(Event::SourcesChanged(params.clone()));
    }

    fn on_service_statistic_received(&self, params: &Value) {
        self.record(Event::ServiceStatistic(params.clone()));
    }

    fn on_stream_status(&self, params: &Value) { self.record(Event::StreamStatus(params.clone())); }

    fn on_client_state_changed(&self, state: ConnectionState) {
        self.record(Event::ClientState(state));
    }
}

/// Queue of events recorded by a [`Recorder`].
pub struct Events(mpsc::UnboundedReceiver<Event>);

impl Events {
    /// Next event, waiting up to [`WAIT`].
    ///
    /// # Panics
    ///
    /// Panics if nothing is recorded in time.
    pub async fn next(&mut self) -> Event {
        timeout(WAIT, self.0.recv())
            .await
            .expect("event within deadline")
            .expect("recorder alive")
    }

    /// Skip events until one satisfies `pred`.
    ///
    /// # Panics
    ///
    /// Panics if no matching event is recorded in time.
    pub async fn next_matching(&mut self, pred: impl Fn(&Event) -> bool) -> Event {
        loop {
            let event = self.next().await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Skip events until the client reports `state`.
    pub async fn wait_for_state(&mut self, state: ConnectionState) {
        self.next_matching(|event| {
            matches!(event, Event::State(s) | Event::ClientState(s) if *s == state)
        })
        .await;
    }

    /// Event already recorded, without waiting.
    pub fn try_next(&mut self) -> Option<Event> { self.0.try_recv().ok() }

    /// Drain everything recorded so far.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

/// Create a recorder and the queue it feeds.
#[must_use]
pub fn recorder() -> (Arc<Recorder>, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder(tx)), Events(rx))
}

/// [`NotificationSink`] that keeps every emitted payload.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<(String, Value)>>);

impl RecordingSink {
    /// Everything emitted so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder of the lock panicked.
    #[must_use]
    pub fn emitted(&self) -> Vec<(String, Value)> { self.0.lock().expect("sink lock").clone() }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, channel: &str, payload: Value) {
        self.0
            .lock()
            .expect("sink lock")
            .push((channel.to_owned(), payload));
    }
}
