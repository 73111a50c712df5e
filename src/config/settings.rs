use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Capacity of each connection's outbound queue
    #[serde(default = "default_send_buffer_size")]
    pub send_buffer_size: usize,
    /// Ping interval in seconds (must be shorter than pong_timeout)
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Seconds without any inbound frame before the connection is considered dead
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout: u64,
    /// Upper bound for a single frame write, in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    /// Maximum inbound message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_send_buffer_size() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    54
}

fn default_pong_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    512
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("websocket.send_buffer_size", 256)?
            .set_default("websocket.ping_interval", 54)?
            .set_default("websocket.pong_timeout", 60)?
            .set_default("websocket.write_timeout", 10)?
            .set_default("websocket.max_message_size", 512)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, JWT__SECRET, API__KEY, WEBSOCKET__SEND_BUFFER_SIZE, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".into()));
        }
        if self.websocket.send_buffer_size == 0 {
            return Err(ConfigError::Message(
                "websocket.send_buffer_size must be greater than zero".into(),
            ));
        }
        if self.websocket.ping_interval == 0 || self.websocket.write_timeout == 0 {
            return Err(ConfigError::Message(
                "websocket.ping_interval and websocket.write_timeout must be greater than zero"
                    .into(),
            ));
        }
        if self.websocket.ping_interval >= self.websocket.pong_timeout {
            return Err(ConfigError::Message(
                "websocket.ping_interval must be shorter than websocket.pong_timeout".into(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: default_send_buffer_size(),
            ping_interval: default_ping_interval(),
            pong_timeout: default_pong_timeout(),
            write_timeout: default_write_timeout(),
            max_message_size: default_max_message_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(websocket: WebSocketConfig) -> Settings {
        Settings {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: "secret".to_string(),
                issuer: None,
                audience: None,
            },
            api: ApiConfig::default(),
            websocket,
        }
    }

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let ws = WebSocketConfig::default();
        assert_eq!(ws.send_buffer_size, 256);
        assert_eq!(ws.ping_interval(), Duration::from_secs(54));
        assert_eq!(ws.pong_timeout(), Duration::from_secs(60));
        assert_eq!(ws.write_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_ping_not_shorter_than_pong() {
        let settings = settings_with(WebSocketConfig {
            ping_interval: 60,
            pong_timeout: 60,
            ..Default::default()
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let settings = settings_with(WebSocketConfig {
            send_buffer_size: 0,
            ..Default::default()
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let settings = settings_with(WebSocketConfig::default());
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
    }
}
