//! Prometheus metrics for the notification hub.
//!
//! Gauges describing the registry size are refreshed when `/metrics` is
//! scraped; counters are recorded at the point where the event happens.

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, MessageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "hub";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Total number of registered WebSocket connections
    pub static ref CONNECTIONS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_connections_total", METRIC_PREFIX),
        "Total number of registered WebSocket connections"
    ).unwrap();

    /// Number of users with at least one live connection
    pub static ref USERS_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_users_connected", METRIC_PREFIX),
        "Number of unique connected users"
    ).unwrap();

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections admitted"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// Upgrades refused because no user id could be resolved
    pub static ref WS_UPGRADES_REJECTED: IntCounter = register_int_counter!(
        format!("{}_ws_upgrades_rejected_total", METRIC_PREFIX),
        "Total WebSocket upgrades rejected for missing or invalid credentials"
    ).unwrap();

    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection lifetime in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0, 86400.0]
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    /// Broadcast calls by kind
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcast calls",
        &["kind"]
    ).unwrap();

    /// Messages accepted onto a connection's outbound queue
    pub static ref MESSAGES_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_enqueued_total", METRIC_PREFIX),
        "Total messages enqueued to connections"
    ).unwrap();

    /// Connections dropped because their outbound queue was full
    pub static ref CONNECTIONS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_evicted_total", METRIC_PREFIX),
        "Total connections evicted for falling behind"
    ).unwrap();
}
