//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod routes;
mod users;

pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use users::{logout_user, send_to_user, DeliveryResponse};
