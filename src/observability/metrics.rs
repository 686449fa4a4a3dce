//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_frames_received_total` (counter): frames read from the stream
//! - `bridge_frames_dropped_total` (counter): frames dropped by the subscriber, by reason
//! - `bridge_envelopes_enqueued_total` (counter): envelopes pushed, by kind
//! - `bridge_envelopes_dropped_total` (counter): envelopes discarded by the engine, by reason
//! - `bridge_channel_unfinished` (gauge): pushed but not yet acknowledged
//! - `bridge_actions_submitted_total` (counter): external actions, by kind
//! - `bridge_correlations_matched_total` (counter): matched confirmations
//! - `bridge_deployments_confirmed_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_frame_received() {
    counter!("bridge_frames_received_total").increment(1);
}

pub fn record_frame_dropped(reason: &'static str) {
    counter!("bridge_frames_dropped_total", "reason" => reason).increment(1);
}

pub fn record_envelope_enqueued(kind: &'static str) {
    counter!("bridge_envelopes_enqueued_total", "kind" => kind).increment(1);
}

pub fn record_envelope_dropped(reason: &'static str) {
    counter!("bridge_envelopes_dropped_total", "reason" => reason).increment(1);
}

pub fn record_channel_unfinished(count: u64) {
    gauge!("bridge_channel_unfinished").set(count as f64);
}

pub fn record_action_submitted(kind: &'static str) {
    counter!("bridge_actions_submitted_total", "kind" => kind).increment(1);
}

pub fn record_correlation_matched() {
    counter!("bridge_correlations_matched_total").increment(1);
}

pub fn record_deployment_confirmed() {
    counter!("bridge_deployments_confirmed_total").increment(1);
}
