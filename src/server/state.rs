use std::sync::Arc;
use std::time::Instant;

use crate::auth::{JwtValidator, TokenAuthenticator};
use crate::config::Settings;
use crate::connection_manager::Hub;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub authenticator: Arc<dyn TokenAuthenticator>,
    pub hub: Arc<Hub>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let authenticator: Arc<dyn TokenAuthenticator> = Arc::new(JwtValidator::new(&settings.jwt));
        Self::with_authenticator(settings, authenticator)
    }

    /// Build state around a custom token authenticator
    pub fn with_authenticator(settings: Settings, authenticator: Arc<dyn TokenAuthenticator>) -> Self {
        Self {
            settings: Arc::new(settings),
            authenticator,
            hub: Arc::new(Hub::new()),
            start_time: Instant::now(),
        }
    }
}
