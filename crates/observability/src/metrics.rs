//! Gateway metrics
//!
//! Thin wrappers over the `metrics` facade so metric names live in one place.
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};

/// Record a reading decoded by a listener
pub fn record_reading_received(listener: &str) {
    counter!(
        "telemetry_gateway_readings_received_total",
        "listener" => listener.to_string()
    )
    .increment(1);
}

/// Record a rejected frame
pub fn record_frame_rejected(listener: &str, reason: &'static str) {
    counter!(
        "telemetry_gateway_frames_rejected_total",
        "listener" => listener.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a reading accepted into a dispatcher buffer
pub fn record_reading_buffered(dispatcher: &str) {
    counter!(
        "telemetry_gateway_readings_buffered_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Record the outcome of one send
///
/// `failure` is `None` on success, or the failure kind label.
pub fn record_send_result(dispatcher: &str, failure: Option<&'static str>, items: usize) {
    match failure {
        None => {
            counter!(
                "telemetry_gateway_sends_total",
                "dispatcher" => dispatcher.to_string(),
                "status" => "success"
            )
            .increment(1);
            counter!(
                "telemetry_gateway_readings_sent_total",
                "dispatcher" => dispatcher.to_string()
            )
            .increment(items as u64);
        }
        Some(kind) => {
            counter!(
                "telemetry_gateway_sends_total",
                "dispatcher" => dispatcher.to_string(),
                "status" => "failure",
                "kind" => kind
            )
            .increment(1);
        }
    }
}

/// Record readings dropped by capacity eviction
pub fn record_readings_evicted(dispatcher: &str, count: usize) {
    counter!(
        "telemetry_gateway_readings_evicted_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(count as u64);
}

/// Record dispatcher buffer depth
pub fn record_buffer_depth(dispatcher: &str, depth: usize) {
    gauge!(
        "telemetry_gateway_buffer_depth",
        "dispatcher" => dispatcher.to_string()
    )
    .set(depth as f64);
}
