use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::metrics::{ConnectionMetrics, MessageMetrics};
use crate::websocket::ControlMessage;

use super::{BroadcastResult, ConnectionError, ConnectionHandle, HubStats};

#[derive(Debug, Default)]
struct HubCounters {
    registered: AtomicU64,
    unregistered: AtomicU64,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

/// Process-wide table of live connections keyed by user ID.
///
/// A user key is present only while at least one of its connections is
/// registered. Mutations take the shard write lock through the entry API;
/// broadcasts clone one user's set under a read guard and release it before
/// touching any connection.
pub struct Hub {
    /// user_id -> connection_id -> handle (supports multiple devices)
    users: DashMap<String, HashMap<Uuid, Arc<ConnectionHandle>>>,
    counters: HubCounters,
    /// Pump tasks of every admitted connection
    tasks: TaskTracker,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            counters: HubCounters::default(),
            tasks: TaskTracker::new(),
        }
    }

    /// Tracker that connection pumps are spawned on, so shutdown can wait
    /// for them.
    pub fn tasks(&self) -> TaskTracker {
        self.tasks.clone()
    }

    /// Register a connection under its user. Registering the same handle
    /// twice leaves a single entry.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let conn_id = handle.id;
        let user_id = handle.user_id.clone();

        let (inserted, user_connections) = {
            let mut conns = self.users.entry(user_id.clone()).or_default();
            let inserted = conns.insert(conn_id, handle.clone()).is_none();
            (inserted, conns.len())
        };

        if inserted {
            self.counters.registered.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                connection_id = %conn_id,
                user_id = %user_id,
                user_connections = user_connections,
                "Connection registered"
            );
        }

        // A close that raced ahead of the insert would leave a dead entry behind
        if handle.is_closed() {
            self.unregister(&handle);
        }
    }

    /// Remove a connection and close it. Safe to call any number of times;
    /// returns `true` only for the call that removed it.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let (removed, remaining) = match self.users.entry(handle.user_id.clone()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(&handle.id).is_some();
                let remaining = entry.get().len();
                if remaining == 0 {
                    entry.remove();
                }
                (removed, remaining)
            }
            Entry::Vacant(_) => (false, 0),
        };

        handle.close();

        if removed {
            self.counters.unregistered.fetch_add(1, Ordering::Relaxed);
            ConnectionMetrics::record_closed(handle.lifetime());
            tracing::info!(
                connection_id = %handle.id,
                user_id = %handle.user_id,
                remaining = remaining,
                "Connection unregistered"
            );
        }

        removed
    }

    /// Enqueue `payload` on every connection of `user_id` without waiting.
    ///
    /// Connections whose outbound queue is full are evicted. A user with no
    /// connections is not an error.
    pub fn broadcast_to_user(&self, user_id: &str, payload: impl Into<Bytes>) -> BroadcastResult {
        MessageMetrics::record_broadcast();
        self.fan_out(user_id, payload.into())
    }

    /// Tell every live session of `user_id` to terminate locally.
    pub fn notify_logout(&self, user_id: &str) -> BroadcastResult {
        MessageMetrics::record_logout();

        let payload = match ControlMessage::logout().to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize logout message");
                return BroadcastResult::default();
            }
        };

        let result = self.fan_out(user_id, payload);
        tracing::info!(
            user_id = %user_id,
            delivered = result.delivered,
            evicted = result.evicted,
            "Logout notification sent"
        );
        result
    }

    fn fan_out(&self, user_id: &str, payload: Bytes) -> BroadcastResult {
        let targets = self.get_user_connections(user_id);
        let mut result = BroadcastResult::default();

        if targets.is_empty() {
            tracing::debug!(user_id = %user_id, "No connections for user");
            return result;
        }

        for handle in targets {
            match handle.try_send(payload.clone()) {
                Ok(()) => result.delivered += 1,
                Err(ConnectionError::Full) => {
                    tracing::warn!(
                        connection_id = %handle.id,
                        user_id = %user_id,
                        queued = handle.queued(),
                        "Outbound queue full, evicting connection"
                    );
                    if self.unregister(&handle) {
                        result.evicted += 1;
                    }
                }
                Err(ConnectionError::Closed) => {
                    // Already shutting down; make sure it is gone
                    self.unregister(&handle);
                }
            }
        }

        self.counters
            .delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.counters
            .evicted
            .fetch_add(result.evicted as u64, Ordering::Relaxed);
        MessageMetrics::record_enqueued(result.delivered as u64);
        if result.evicted > 0 {
            MessageMetrics::record_evicted(result.evicted as u64);
        }

        tracing::debug!(
            user_id = %user_id,
            delivered = result.delivered,
            evicted = result.evicted,
            "Broadcast to user completed"
        );

        result
    }

    /// Snapshot of a user's connections
    pub fn get_user_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.users
            .get(user_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Close and remove every connection. Returns how many were removed.
    pub fn close_all(&self) -> usize {
        let all: Vec<Arc<ConnectionHandle>> = self
            .users
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect();

        all.iter().filter(|handle| self.unregister(handle)).count()
    }

    /// Close every connection and wait up to `grace` for the pumps to send
    /// their close frames and exit. Returns how many connections were closed.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let closed = self.close_all();
        self.tasks.close();

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                remaining_tasks = self.tasks.len(),
                grace_ms = grace.as_millis() as u64,
                "Connection pumps still running after shutdown grace period"
            );
        }

        closed
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn user_connection_count(&self, user_id: &str) -> usize {
        self.users.get(user_id).map(|conns| conns.len()).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Longest idle time across all live connections
    pub fn max_idle(&self) -> Duration {
        self.users
            .iter()
            .flat_map(|entry| entry.value().values().map(|h| h.idle_for()).collect::<Vec<_>>())
            .max()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            total_connections: self.connection_count(),
            unique_users: self.user_count(),
            total_registered: self.counters.registered.load(Ordering::Relaxed),
            total_unregistered: self.counters.unregistered.load(Ordering::Relaxed),
            total_delivered: self.counters.delivered.load(Ordering::Relaxed),
            total_evicted: self.counters.evicted.load(Ordering::Relaxed),
            max_idle_seconds: self.max_idle().as_secs(),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
