//! Push endpoints addressing every live session of one user.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub user_id: String,
    pub delivered: usize,
    pub evicted: usize,
}

/// POST /api/v1/users/{user_id}/logout - Force every session of a user to log out
pub async fn logout_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<DeliveryResponse> {
    let result = state.hub.notify_logout(&user_id);

    Json(DeliveryResponse {
        user_id,
        delivered: result.delivered,
        evicted: result.evicted,
    })
}

/// POST /api/v1/users/{user_id}/messages - Push a JSON payload to every session of a user
pub async fn send_to_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<DeliveryResponse>> {
    if body.is_null() {
        return Err(AppError::Validation("Message body must not be null".to_string()));
    }

    let payload = serde_json::to_vec(&body)
        .map_err(|e| AppError::Internal(format!("Failed to serialize message: {}", e)))?;
    let result = state.hub.broadcast_to_user(&user_id, payload);

    tracing::info!(
        user_id = %user_id,
        delivered = result.delivered,
        evicted = result.evicted,
        "Message pushed to user"
    );

    Ok(Json(DeliveryResponse {
        user_id,
        delivered: result.delivered,
        evicted: result.evicted,
    }))
}
