use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        RawQuery, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::timeout;

use crate::auth::TokenAuthenticator;
use crate::config::WebSocketConfig;
use crate::connection_manager::{ConnectionHandle, Hub};
use crate::metrics::ConnectionMetrics;
use crate::server::AppState;

use super::connection::{Connection, PumpTiming};
use super::message::ControlMessage;

/// Upper bound for delivering the rejection message to an unauthenticated client
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct WsQuery {
    pub user_id: Option<String>,
}

impl WsQuery {
    /// Parse the raw query string leniently: the first non-empty `user_id`
    /// wins, and a query that cannot be decoded yields no user ID.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
            Ok(pairs) => Self {
                user_id: pairs
                    .into_iter()
                    .find(|(key, value)| key == "user_id" && !value.is_empty())
                    .map(|(_, value)| value),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable query string");
                Self::default()
            }
        }
    }
}

/// WebSocket upgrade handler
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, raw_query, headers),
    fields(has_query = raw_query.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = WsQuery::parse(raw_query.as_deref());
    let user_id = resolve_user_id(&query, &headers, state.authenticator.as_ref());
    let hub = state.hub.clone();
    let config = state.settings.websocket.clone();

    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            match user_id {
                Some(user_id) => {
                    admit(hub, user_id, sink, stream, &config);
                }
                None => reject(sink).await,
            }
        })
}

/// Resolve the connecting user.
///
/// A non-empty `user_id` query parameter wins; otherwise the bearer token in
/// the Authorization header is validated. Returns `None` when neither yields
/// a user.
pub fn resolve_user_id(
    query: &WsQuery,
    headers: &HeaderMap,
    authenticator: &dyn TokenAuthenticator,
) -> Option<String> {
    if let Some(user_id) = query.user_id.as_deref().filter(|id| !id.is_empty()) {
        return Some(user_id.to_string());
    }

    let token = extract_bearer_token(headers)?;
    match authenticator.authenticate(token) {
        Ok(user_id) => Some(user_id),
        Err(e) => {
            tracing::warn!(error = %e, "Bearer token rejected");
            None
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Build a connection for `user_id`, register it and start its pumps.
/// Returns as soon as the pumps are running.
pub fn admit<S, R, E>(
    hub: Arc<Hub>,
    user_id: String,
    sink: S,
    stream: R,
    config: &WebSocketConfig,
) -> Arc<ConnectionHandle>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let connection = Connection::new(user_id, sink, stream, config.send_buffer_size);
    let handle = connection.handle();

    hub.register(handle.clone());
    connection.start(hub, PumpTiming::from(config));
    ConnectionMetrics::record_opened();

    tracing::info!(
        connection_id = %handle.id,
        user_id = %handle.user_id,
        "WebSocket client connected"
    );

    handle
}

/// Tell an unauthenticated client why it is being turned away, then close.
pub async fn reject<S>(mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    ConnectionMetrics::record_rejected();
    tracing::warn!("WebSocket connection rejected: no user ID");

    match ControlMessage::auth_required().to_json() {
        Ok(json) => {
            let _ = timeout(REJECT_WRITE_TIMEOUT, sink.send(Message::Text(json.into()))).await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize rejection message");
        }
    }

    let _ = timeout(REJECT_WRITE_TIMEOUT, sink.send(Message::Close(None))).await;
    let _ = timeout(REJECT_WRITE_TIMEOUT, sink.close()).await;
}
