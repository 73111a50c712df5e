use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::users::{logout_user, send_to_user};

pub fn api_routes(state: AppState) -> Router<AppState> {
    let push = Router::new()
        .route("/users/{user_id}/logout", post(logout_user))
        .route("/users/{user_id}/messages", post(send_to_user))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Push endpoints
        .nest("/api/v1", push)
}
