//! Typed node commands.
//!
//! `activate` needs an open socket; everything else needs an active
//! connection. Commands issued in the wrong state are logged at debug level
//! and otherwise ignored: nothing is queued and nothing is registered.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::Client;
use crate::{
    message::{Request, RequestId, method, timestamp_params},
    state::ConnectionState,
};

/// Working directories the node needs before it can run streams.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDirectories {
    /// Where stream and service logs are written.
    pub feedback_directory: String,
    /// Time-shift buffers.
    pub timeshifts_directory: String,
    /// HLS output.
    pub hls_directory: String,
    /// Generated playlists.
    pub playlists_directory: String,
    /// DVB tuning data.
    pub dvb_directory: String,
    /// Capture card descriptions.
    pub capture_card_directory: String,
}

impl Client {
    /// Ask the node to activate this session with `license_key`.
    ///
    /// A success response moves the connection to
    /// [`ConnectionState::Active`].
    pub fn activate(&self, id: RequestId, license_key: &str) {
        self.send_when(
            ConnectionState::is_connected,
            Request::new(id, method::ACTIVATE, json!({ "license_key": license_key })),
        );
    }

    /// Probe the service; the params carry the current UTC time.
    pub fn ping_service(&self, id: RequestId) {
        self.send_active(Request::new(id, method::PING_SERVICE, timestamp_params()));
    }

    /// Hand the node its working directories.
    pub fn prepare_service(&self, id: RequestId, directories: &ServiceDirectories) {
        let params = json!({
            "feedback_directory": directories.feedback_directory,
            "timeshifts_directory": directories.timeshifts_directory,
            "hls_directory": directories.hls_directory,
            "playlists_directory": directories.playlists_directory,
            "dvb_directory": directories.dvb_directory,
            "capture_card_directory": directories.capture_card_directory,
        });
        self.send_active(Request::new(id, method::PREPARE_SERVICE, params));
    }

    /// Ask the service to stop after `delay` seconds.
    pub fn stop_service(&self, id: RequestId, delay: u32) {
        self.send_active(Request::new(id, method::STOP_SERVICE, json!({ "delay": delay })));
    }

    /// Fetch the service log stored at `path`.
    pub fn get_log_service(&self, id: RequestId, path: &str) {
        self.send_active(Request::new(id, method::GET_LOG_SERVICE, json!({ "path": path })));
    }

    /// Start a stream described by `config`.
    pub fn start_stream(&self, id: RequestId, config: Value) {
        self.send_active(Request::new(id, method::START_STREAM, json!({ "config": config })));
    }

    /// Stop the stream `stream_id`.
    pub fn stop_stream(&self, id: RequestId, stream_id: &str) {
        self.send_active(Request::new(id, method::STOP_STREAM, json!({ "id": stream_id })));
    }

    /// Restart the stream `stream_id`.
    pub fn restart_stream(&self, id: RequestId, stream_id: &str) {
        self.send_active(Request::new(id, method::RESTART_STREAM, json!({ "id": stream_id })));
    }

    /// Fetch the log of stream `stream_id` stored at `path`.
    pub fn get_log_stream(
        &self,
        id: RequestId,
        stream_id: &str,
        feedback_directory: &str,
        path: &str,
    ) {
        self.send_active(Request::new(
            id,
            method::GET_LOG_STREAM,
            json!({
                "id": stream_id,
                "feedback_directory": feedback_directory,
                "path": path,
            }),
        ));
    }

    /// Send a notification; no response is expected or tracked.
    pub fn notify(&self, method: &str, params: Value) {
        self.send_active(Request::notification(method, params));
    }

    fn send_active(&self, request: Request) {
        self.send_when(ConnectionState::is_active, request);
    }

    fn send_when(&self, ready: fn(ConnectionState) -> bool, request: Request) {
        let state = self.status();
        if !ready(state) {
            debug!(method = %request.method, %state, "command skipped in current state");
            return;
        }
        self.inner.send_request(request);
    }
}
