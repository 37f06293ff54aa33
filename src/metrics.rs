//! Metric helpers for `nodewire`.
//!
//! Names and thin wrappers around the [`metrics`](https://docs.rs/metrics)
//! facade. Without the `metrics` feature every helper compiles to nothing,
//! so call sites never need their own `cfg`.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open node connections.
pub const CONNECTIONS_ACTIVE: &str = "nodewire_connections_active";
/// Name of the counter tracking frames read or written.
pub const FRAMES_PROCESSED: &str = "nodewire_frames_processed_total";
/// Name of the counter tracking transport and encoding errors.
pub const ERRORS_TOTAL: &str = "nodewire_errors_total";
/// Name of the counter tracking inbound frames that were discarded.
pub const FRAMES_DROPPED: &str = "nodewire_frames_dropped_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received from the node.
    Inbound,
    /// Frames sent to the node.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Why an inbound frame was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The declared length reached the frame limit.
    Oversized,
    /// The payload was not a valid JSON-RPC message.
    Malformed,
}

impl DropReason {
    /// Label value used for the `reason` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DropReason::Oversized => "oversized",
            DropReason::Malformed => "malformed",
        }
    }
}

/// Increment the open connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a discarded inbound frame.
pub fn inc_dropped(reason: DropReason) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DROPPED, "reason" => reason.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record an error occurrence.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}
