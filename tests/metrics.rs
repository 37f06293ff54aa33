#![cfg(feature = "metrics")]
//! Tests for `nodewire` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use nodewire::metrics::{self, Direction, DropReason};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn labelled_counter(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            let matches = key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
            match value {
                DebugValue::Counter(count) if matches => Some(count),
                _ => None,
            }
        })
}

#[rstest]
#[case(Direction::Inbound)]
#[case(Direction::Outbound)]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || metrics::inc_frames(direction));

    assert_eq!(
        labelled_counter(&snapshotter, metrics::FRAMES_PROCESSED, ("direction", direction.as_str())),
        Some(1)
    );
}

#[rstest]
#[case(DropReason::Oversized, 1)]
#[case(DropReason::Malformed, 3)]
fn dropped_frames_count_by_reason(#[case] reason: DropReason, #[case] times: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || {
        (0..times).for_each(|_| metrics::inc_dropped(reason));
    });

    assert_eq!(
        labelled_counter(&snapshotter, metrics::FRAMES_DROPPED, ("reason", reason.as_str())),
        Some(times)
    );
}

#[test]
fn error_metric_increments() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, metrics::inc_errors);

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == nodewire::metrics::ERRORS_TOTAL
            && matches!(v, DebugValue::Counter(c) if *c > 0)
    });
    assert!(found, "error metric not recorded");
}

#[test]
fn connection_gauge_tracks_open_connections() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || {
        metrics::inc_connections();
        metrics::inc_connections();
        metrics::dec_connections();
    });

    let metrics = snapshotter.snapshot().into_vec();
    let gauge = metrics.iter().find_map(|(k, _, _, v)| match v {
        DebugValue::Gauge(value) if k.key().name() == nodewire::metrics::CONNECTIONS_ACTIVE => {
            Some(value.into_inner())
        }
        _ => None,
    });
    assert_eq!(gauge, Some(1.0));
}
