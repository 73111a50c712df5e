//! Per-user registry of live WebSocket connections
//!
//! This module provides:
//! - Connection handles with a bounded outbound queue and a shared close signal
//! - The user-indexed registry (`Hub`) with targeted, non-blocking broadcast
//! - Registry statistics

mod registry;
mod stats;
mod types;

pub use registry::Hub;
pub use stats::{BroadcastResult, HubStats};
pub use types::{ConnectionError, ConnectionHandle};
