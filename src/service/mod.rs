//! Service layer on top of the node client.
//!
//! [`ServiceClient`] binds a [`Client`](crate::client::Client) to a set of
//! [`ServiceSettings`] and routes the node's reports to a [`StreamHandler`].
//! [`ServiceMonitor`] is a ready-made handler that keeps the latest service
//! statistics and pushes updates through a [`NotificationSink`].

mod client;
mod handler;
mod monitor;
mod settings;

pub use client::ServiceClient;
pub use handler::{NotificationSink, StreamHandler};
pub use monitor::{SERVICE_DATA_CHANGED, STREAM_DATA_CHANGED, ServiceMonitor, ServiceStats};
pub use settings::{
    DEFAULT_SERVICE_HOST,
    DEFAULT_SERVICE_NAME,
    DEFAULT_SERVICE_PORT,
    DEFAULT_SERVICE_ROOT_DIR,
    ServiceSettings,
    stream_log_path,
};
