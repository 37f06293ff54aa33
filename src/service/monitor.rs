//! Dashboard-facing view of a service.
//!
//! [`ServiceMonitor`] keeps the node's most recent service statistics and
//! republishes service and stream reports through a [`NotificationSink`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{NotificationSink, StreamHandler};
use crate::state::ConnectionState;

/// Channel carrying service statistics and status.
pub const SERVICE_DATA_CHANGED: &str = "service_data_changed";
/// Channel carrying per-stream reports.
pub const STREAM_DATA_CHANGED: &str = "stream_data_changed";

/// Latest statistics reported by the node. Every field is `None` until the
/// first report, and again after the connection leaves `ACTIVE`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    /// Node identifier.
    pub id: Option<Value>,
    /// CPU utilisation.
    pub cpu: Option<Value>,
    /// GPU utilisation.
    pub gpu: Option<Value>,
    /// System load average.
    pub load_average: Option<Value>,
    /// Installed memory.
    pub memory_total: Option<Value>,
    /// Unused memory.
    pub memory_free: Option<Value>,
    /// Memory available to new processes.
    pub memory_available: Option<Value>,
    /// Disk capacity.
    pub hdd_total: Option<Value>,
    /// Free disk space.
    pub hdd_free: Option<Value>,
    /// Inbound network throughput.
    pub bandwidth_in: Option<Value>,
    /// Outbound network throughput.
    pub bandwidth_out: Option<Value>,
    /// Time since the node started.
    pub uptime: Option<Value>,
    /// When the node took the sample.
    pub timestamp: Option<Value>,
    /// Node software version.
    pub version: Option<Value>,
}

impl ServiceStats {
    /// Copy every known field present in `report`. Fields the report omits
    /// keep their previous value.
    pub fn refresh(&mut self, report: &Value) {
        let Some(report) = report.as_object() else {
            return;
        };
        let fields: [(&str, &mut Option<Value>); 14] = [
            ("id", &mut self.id),
            ("cpu", &mut self.cpu),
            ("gpu", &mut self.gpu),
            ("load_average", &mut self.load_average),
            ("memory_total", &mut self.memory_total),
            ("memory_free", &mut self.memory_free),
            ("memory_available", &mut self.memory_available),
            ("hdd_total", &mut self.hdd_total),
            ("hdd_free", &mut self.hdd_free),
            ("bandwidth_in", &mut self.bandwidth_in),
            ("bandwidth_out", &mut self.bandwidth_out),
            ("uptime", &mut self.uptime),
            ("timestamp", &mut self.timestamp),
            ("version", &mut self.version),
        ];
        for (key, slot) in fields {
            if let Some(value) = report.get(key) {
                *slot = Some(value.clone());
            }
        }
    }
}

/// A [`StreamHandler`] that mirrors service state to a dashboard.
pub struct ServiceMonitor {
    sink: Arc<dyn NotificationSink>,
    inner: Mutex<MonitorState>,
}

#[derive(Default)]
struct MonitorState {
    stats: ServiceStats,
    status: ConnectionState,
}

impl ServiceMonitor {
    /// Create a monitor publishing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            inner: Mutex::new(MonitorState::default()),
        }
    }

    /// Copy of the latest statistics.
    #[must_use]
    pub fn stats(&self) -> ServiceStats { self.state().stats.clone() }

    /// Last connection state observed.
    #[must_use]
    pub fn status(&self) -> ConnectionState { self.state().status }

    /// Statistics plus connection state, as published on
    /// [`SERVICE_DATA_CHANGED`].
    #[must_use]
    pub fn to_front(&self) -> Value {
        let state = self.state();
        let mut front = match serde_json::to_value(&state.stats) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        front.insert("status".to_owned(), Value::from(state.status.code()));
        Value::Object(front)
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamHandler for ServiceMonitor {
    fn on_stream_statistic_received(&self, params: &Value) {
        self.sink.emit(STREAM_DATA_CHANGED, params.clone());
    }

    fn on_stream_sources_changed(&self, params: &Value) {
        debug!(%params, "stream sources changed");
    }

    fn on_service_statistic_received(&self, params: &Value) {
        self.state().stats.refresh(params);
        self.sink.emit(SERVICE_DATA_CHANGED, self.to_front());
    }

    fn on_stream_status(&self, params: &Value) {
        self.sink.emit(STREAM_DATA_CHANGED, params.clone());
    }

    fn on_client_state_changed(&self, state: ConnectionState) {
        let mut current = self.state();
        current.status = state;
        if !state.is_active() {
            current.stats = ServiceStats::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use super::{SERVICE_DATA_CHANGED, STREAM_DATA_CHANGED, ServiceMonitor, ServiceStats};
    use crate::{
        service::{NotificationSink, StreamHandler},
        state::ConnectionState,
    };

    #[derive(Default)]
    struct Sink(Mutex<Vec<(String, Value)>>);

    impl NotificationSink for Sink {
        fn emit(&self, channel: &str, payload: Value) {
            self.0
                .lock()
                .expect("sink lock")
                .push((channel.to_owned(), payload));
        }
    }

    fn monitor() -> (ServiceMonitor, Arc<Sink>) {
        let sink = Arc::new(Sink::default());
        (ServiceMonitor::new(sink.clone()), sink)
    }

    #[test]
    fn refresh_keeps_fields_the_report_omits() {
        let mut stats = ServiceStats::default();
        stats.refresh(&json!({"cpu": 12.5, "version": "1.4"}));
        stats.refresh(&json!({"cpu": 13.0, "unknown": true}));

        assert_eq!(stats.cpu, Some(json!(13.0)));
        assert_eq!(stats.version, Some(json!("1.4")));
        assert_eq!(stats.gpu, None);
    }

    #[test]
    fn service_report_publishes_stats_and_status() {
        let (monitor, sink) = monitor();
        monitor.on_client_state_changed(ConnectionState::Active);

        monitor.on_service_statistic_received(&json!({"id": "n1", "uptime": 99}));

        let events = sink.0.lock().expect("sink lock");
        let (channel, payload) = &events[0];
        assert_eq!(channel, SERVICE_DATA_CHANGED);
        assert_eq!(payload["id"], "n1");
        assert_eq!(payload["uptime"], 99);
        assert_eq!(payload["status"], 2);
        assert_eq!(payload["cpu"], Value::Null);
    }

    #[test]
    fn stream_reports_are_forwarded() {
        let (monitor, sink) = monitor();

        monitor.on_stream_statistic_received(&json!({"id": "s1", "rss": 10}));
        monitor.on_stream_status(&json!({"id": "s1"}));

        let events = sink.0.lock().expect("sink lock");
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(channel, _)| channel == STREAM_DATA_CHANGED));
    }

    #[test]
    fn leaving_active_resets_stats() {
        let (monitor, _sink) = monitor();
        monitor.on_client_state_changed(ConnectionState::Active);
        monitor.on_service_statistic_received(&json!({"cpu": 1}));

        monitor.on_client_state_changed(ConnectionState::Init);

        assert_eq!(monitor.stats(), ServiceStats::default());
        assert_eq!(monitor.status(), ConnectionState::Init);
    }
}
