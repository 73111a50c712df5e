//! One admitted WebSocket and its two pumps.
//!
//! The outbound pump drains the connection's queue into the socket and sends
//! periodic pings. The inbound pump drains frames from the socket, enforcing
//! the liveness deadline. Whichever pump fails first unregisters the
//! connection; the other observes the close signal and exits. Only the
//! outbound pump closes the socket.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::Instrument;

use crate::config::WebSocketConfig;
use crate::connection_manager::{ConnectionHandle, Hub};

/// Timing parameters shared by both pumps
#[derive(Debug, Clone, Copy)]
pub struct PumpTiming {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&WebSocketConfig> for PumpTiming {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// A connection that has been constructed but whose pumps are not running yet
pub struct Connection<S, R> {
    handle: Arc<ConnectionHandle>,
    outbound: mpsc::Receiver<Bytes>,
    sink: S,
    stream: R,
}

/// Join handles of a started connection's pumps
pub struct ConnectionTasks {
    pub outbound: JoinHandle<()>,
    pub inbound: JoinHandle<()>,
}

impl<S, R, E> Connection<S, R>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    pub fn new(user_id: impl Into<String>, sink: S, stream: R, capacity: usize) -> Self {
        let (handle, outbound) = ConnectionHandle::new(user_id, capacity);
        Self {
            handle,
            outbound,
            sink,
            stream,
        }
    }

    pub fn handle(&self) -> Arc<ConnectionHandle> {
        self.handle.clone()
    }

    /// Spawn both pumps. They run until the connection is closed.
    pub fn start(self, hub: Arc<Hub>, timing: PumpTiming) -> ConnectionTasks {
        let Connection {
            handle,
            outbound,
            sink,
            stream,
        } = self;

        let outbound_span = tracing::debug_span!(
            "ws.outbound",
            connection_id = %handle.id,
            user_id = %handle.user_id
        );
        let inbound_span = tracing::debug_span!(
            "ws.inbound",
            connection_id = %handle.id,
            user_id = %handle.user_id
        );

        let tracker = hub.tasks();
        let outbound = tracker.spawn(
            write_pump(sink, outbound, hub.clone(), handle.clone(), timing).instrument(outbound_span),
        );
        let inbound = tracker.spawn(
            read_pump(stream, hub, handle, timing.pong_timeout).instrument(inbound_span),
        );

        ConnectionTasks { outbound, inbound }
    }
}

/// Text frames for UTF-8 payloads, binary frames otherwise
fn payload_frame(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}

async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Bytes>,
    hub: Arc<Hub>,
    handle: Arc<ConnectionHandle>,
    timing: PumpTiming,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval_at(Instant::now() + timing.ping_interval, timing.ping_interval);

    loop {
        let frame = tokio::select! {
            _ = handle.closed() => break,
            next = outbound.recv() => match next {
                Some(payload) => payload_frame(payload),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(timing.write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket write failed");
                break;
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = timing.write_timeout.as_millis() as u64,
                    "WebSocket write timed out"
                );
                break;
            }
        }
    }

    hub.unregister(&handle);

    // The peer may already be gone
    let _ = timeout(timing.write_timeout, sink.send(Message::Close(None))).await;
    let _ = timeout(timing.write_timeout, sink.close()).await;

    tracing::debug!("Outbound pump stopped");
}

async fn read_pump<R, E>(
    mut stream: R,
    hub: Arc<Hub>,
    handle: Arc<ConnectionHandle>,
    pong_timeout: Duration,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + pong_timeout;

    loop {
        tokio::select! {
            _ = handle.closed() => break,
            next = timeout_at(deadline, stream.next()) => match next {
                Ok(Some(Ok(Message::Close(_)))) => {
                    tracing::debug!("Received close frame");
                    break;
                }
                Ok(Some(Ok(_))) => {
                    // Any frame, pongs included, proves the peer is alive
                    handle.update_activity();
                    deadline = Instant::now() + pong_timeout;
                }
                Ok(Some(Err(e))) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    break;
                }
                Ok(None) => {
                    tracing::debug!("WebSocket stream ended");
                    break;
                }
                Err(_) => {
                    tracing::info!(
                        timeout_ms = pong_timeout.as_millis() as u64,
                        "No frame within liveness timeout"
                    );
                    break;
                }
            },
        }
    }

    hub.unregister(&handle);
    tracing::debug!("Inbound pump stopped");
}
