//! Registry statistics and broadcast outcome structures

use serde::Serialize;

/// Registry statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub unique_users: usize,
    pub total_registered: u64,
    pub total_unregistered: u64,
    pub total_delivered: u64,
    pub total_evicted: u64,
    /// Longest time any live connection has gone without an inbound frame
    pub max_idle_seconds: u64,
}

/// Outcome of a single `broadcast_to_user` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    /// Connections the payload was enqueued on
    pub delivered: usize,
    /// Connections dropped because their outbound queue was full
    pub evicted: usize,
}
