//! Connection and directory settings for one media service.

use serde::{Deserialize, Serialize};

use crate::client::ServiceDirectories;

/// Host used when none is configured.
pub const DEFAULT_SERVICE_HOST: &str = "localhost";
/// Port the node listens on by default.
pub const DEFAULT_SERVICE_PORT: u16 = 6317;
/// Display name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "Service";
/// Root under which the default working directories live on the node.
pub const DEFAULT_SERVICE_ROOT_DIR: &str = "~/streamer";

/// Settings for a single service.
///
/// Paths are interpreted on the node, so `~` is left for the node to expand.
/// Missing fields fall back to their defaults when deserialising.
///
/// # Examples
///
/// ```
/// use nodewire::service::ServiceSettings;
///
/// let settings: ServiceSettings =
///     serde_json::from_str(r#"{"id": "n1", "port": 7000}"#).expect("valid settings");
/// assert_eq!(settings.host, "localhost");
/// assert_eq!(settings.port, 7000);
/// assert_eq!(settings.hls_directory, "~/streamer/hls");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Identifier of the service, used in log file names.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Node host name or address.
    pub host: String,
    /// Node port.
    pub port: u16,
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

fn default_dir(leaf: &str) -> String { format!("{DEFAULT_SERVICE_ROOT_DIR}/{leaf}") }

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: DEFAULT_SERVICE_NAME.to_owned(),
            host: DEFAULT_SERVICE_HOST.to_owned(),
            port: DEFAULT_SERVICE_PORT,
            feedback_directory: default_dir("feedback"),
            timeshifts_directory: default_dir("timeshifts"),
            hls_directory: default_dir("hls"),
            playlists_directory: default_dir("playlists"),
            dvb_directory: default_dir("dvb"),
            capture_card_directory: default_dir("capture_card"),
        }
    }
}

impl ServiceSettings {
    /// The six working directories, as sent by `prepare_service`.
    #[must_use]
    pub fn directories(&self) -> ServiceDirectories {
        ServiceDirectories {
            feedback_directory: self.feedback_directory.clone(),
            timeshifts_directory: self.timeshifts_directory.clone(),
            hls_directory: self.hls_directory.clone(),
            playlists_directory: self.playlists_directory.clone(),
            dvb_directory: self.dvb_directory.clone(),
            capture_card_directory: self.capture_card_directory.clone(),
        }
    }

    /// Where the node keeps the log of service `service_id`.
    #[must_use]
    pub fn service_log_path(&self, service_id: &str) -> String {
        format!("{}/service_{service_id}.log", self.feedback_directory)
    }
}

/// Where the node keeps the log of stream `stream_id`.
#[must_use]
pub fn stream_log_path(feedback_directory: &str, stream_id: &str) -> String {
    format!("{feedback_directory}/stream_{stream_id}.log")
}
