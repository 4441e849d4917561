//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Bearer-token verification settings
    pub auth: AuthSettings,

    /// Room message encryption settings
    #[serde(default)]
    pub encryption: EncryptionSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS / allowed origin configuration
    pub cors: CorsSettings,

    /// WebSocket gateway configuration
    pub websocket: WebSocketSettings,

    /// Background housekeeping configuration
    pub sweep: SweepSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Bearer-token verification configuration.
///
/// The gateway verifies tokens minted by the external issuer; it never signs
/// its own. The secret is optional at load time and checked at use time so a
/// misconfigured deployment fails closed on the first connection attempt
/// rather than at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Shared HMAC secret for token verification
    pub secret: Option<String>,

    /// Absolute session lifetime in hours
    pub session_ttl_hours: i64,
}

/// Room message encryption configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionSettings {
    /// Master key from which per-room keys are derived.
    /// Absent means messages are stored and transmitted in clear.
    pub master_key: Option<String>,
}

/// Per-category rate limiting configuration (actions per sliding minute).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Message sends per minute
    pub messages_per_minute: u32,

    /// Typing notifications per minute
    pub typing_per_minute: u32,

    /// Room join/leave/create operations per minute
    pub room_operations_per_minute: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origin for the real-time channel and HTTP surface
    pub allowed_origin: String,
}

/// WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes.
    /// Protects against DoS via oversized frames.
    pub max_message_size: usize,
}

/// Background housekeeping configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    /// Interval between housekeeping passes in seconds
    pub interval_secs: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. built-in defaults
    /// 2. config/default.toml and config/{RUN_ENV}.toml
    /// 3. Environment variables (highest priority)
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("auth.session_ttl_hours", 24)?
            .set_default("rate_limit.messages_per_minute", 10)?
            .set_default("rate_limit.typing_per_minute", 30)?
            .set_default("rate_limit.room_operations_per_minute", 20)?
            .set_default("cors.allowed_origin", "http://localhost:3000")?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("sweep.interval_secs", 300)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("auth.secret", std::env::var("CHAT_JWT_SECRET").ok())?
            .set_override_option(
                "encryption.master_key",
                std::env::var("CHAT_MASTER_KEY").ok(),
            )?
            .set_override_option("cors.allowed_origin", std::env::var("ALLOWED_ORIGIN").ok())?
            .build()?
            .try_deserialize()
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid server address configuration")
    }
}
