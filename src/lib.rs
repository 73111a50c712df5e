// Shared infrastructure
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

// Hub core
pub mod connection_manager;
pub mod websocket;

// Application layer
pub mod api;
pub mod server;
