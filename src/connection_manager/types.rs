//! Connection handle and related types

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Handle for a single WebSocket connection.
///
/// The registry addresses connections through this handle; the pumps share it
/// to observe shutdown. The outbound queue's receiving end belongs to the
/// outbound pump.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Bytes>,
    /// Last activity timestamp (Unix seconds)
    last_activity: AtomicI64,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle with an outbound queue of `capacity` messages and
    /// return it together with the queue's receiving end.
    pub fn new(user_id: impl Into<String>, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let now = Utc::now();
        let handle = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            connected_at: now,
            sender,
            last_activity: AtomicI64::new(now.timestamp()),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });
        (handle, receiver)
    }

    /// Enqueue a payload without waiting.
    pub fn try_send(&self, payload: Bytes) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => ConnectionError::Full,
            TrySendError::Closed(_) => ConnectionError::Closed,
        })
    }

    /// Close the connection. Only the first call has an effect; it returns
    /// `true` for that caller and `false` for everyone after.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Number of messages waiting in the outbound queue
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    /// Time since the peer last sent a frame
    pub fn idle_for(&self) -> Duration {
        (Utc::now() - self.last_activity()).to_std().unwrap_or_default()
    }

    /// Time since the connection was admitted
    pub fn lifetime(&self) -> Duration {
        (Utc::now() - self.connected_at).to_std().unwrap_or_default()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Why a payload could not be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("outbound queue is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_send_until_full() {
        let (handle, _rx) = ConnectionHandle::new("user1", 2);

        assert_eq!(handle.try_send(Bytes::from_static(b"a")), Ok(()));
        assert_eq!(handle.try_send(Bytes::from_static(b"b")), Ok(()));
        assert_eq!(handle.queued(), 2);
        assert_eq!(
            handle.try_send(Bytes::from_static(b"c")),
            Err(ConnectionError::Full)
        );
    }

    #[test]
    fn test_close_is_first_caller_wins() {
        let (handle, _rx) = ConnectionHandle::new("user1", 4);

        assert!(!handle.is_closed());
        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
        assert_eq!(
            handle.try_send(Bytes::from_static(b"late")),
            Err(ConnectionError::Closed)
        );
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::new("user1", 4);
        drop(rx);

        assert_eq!(
            handle.try_send(Bytes::from_static(b"x")),
            Err(ConnectionError::Closed)
        );
    }

    #[tokio::test]
    async fn test_closed_future_resolves_after_close() {
        let (handle, _rx) = ConnectionHandle::new("user1", 4);
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.closed().await });

        handle.close();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (handle, mut rx) = ConnectionHandle::new("user1", 8);
        for i in 0..5u8 {
            handle.try_send(Bytes::from(vec![i])).unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(rx.recv().await.unwrap(), Bytes::from(vec![i]));
        }
    }

    #[test]
    fn test_idle_time_tracks_activity() {
        let (handle, _rx) = ConnectionHandle::new("user1", 4);
        handle
            .last_activity
            .store(Utc::now().timestamp() - 30, Ordering::Relaxed);
        assert!(handle.idle_for() >= Duration::from_secs(29));

        handle.update_activity();
        assert!(handle.idle_for() < Duration::from_secs(2));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (handle, _rx) = ConnectionHandle::new("user1", 0);
        assert!(handle.try_send(Bytes::from_static(b"x")).is_ok());
    }
}
