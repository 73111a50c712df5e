//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCASTS_TOTAL, CONNECTIONS_EVICTED_TOTAL, CONNECTIONS_TOTAL, MESSAGES_ENQUEUED_TOTAL,
    USERS_CONNECTED, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION,
    WS_UPGRADES_REJECTED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
    }

    /// Record a closed connection and how long it lived
    pub fn record_closed(lifetime: Duration) {
        WS_CONNECTIONS_CLOSED.inc();
        WS_CONNECTION_DURATION.observe(lifetime.as_secs_f64());
    }

    pub fn record_rejected() {
        WS_UPGRADES_REJECTED.inc();
    }

    /// Refresh registry size gauges
    pub fn set_registry_size(connections: usize, users: usize) {
        CONNECTIONS_TOTAL.set(connections as i64);
        USERS_CONNECTED.set(users as i64);
    }
}

/// Helper struct for recording message metrics
pub struct MessageMetrics;

impl MessageMetrics {
    pub fn record_broadcast() {
        BROADCASTS_TOTAL.with_label_values(&["message"]).inc();
    }

    pub fn record_logout() {
        BROADCASTS_TOTAL.with_label_values(&["logout"]).inc();
    }

    pub fn record_enqueued(count: u64) {
        MESSAGES_ENQUEUED_TOTAL.inc_by(count);
    }

    pub fn record_evicted(count: u64) {
        CONNECTIONS_EVICTED_TOTAL.inc_by(count);
    }
}
