use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long = "host", env = "REELTALK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long = "port", env = "REELTALK_PORT", default_value_t = 3030)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long = "mgmt-port", env = "REELTALK_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks after a shutdown signal
    #[arg(long = "shutdown-timeout-secs", env = "REELTALK_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long = "trusted-proxies",
        env = "REELTALK_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "REELTALK_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long = "db-max-connections", env = "REELTALK_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Seconds to wait when acquiring a pooled connection
    #[arg(long = "db-acquire-timeout-secs", env = "REELTALK_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Connection attempts at startup before giving up
    #[arg(long = "db-connect-attempts", env = "REELTALK_DB_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub connect_attempts: usize,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Shared secret for signing and verifying access tokens
    #[arg(long = "jwt-secret", env = "REELTALK_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long = "token-ttl-secs", env = "REELTALK_TOKEN_TTL_SECS", default_value_t = 10_800)]
    pub token_ttl_secs: u64,

    /// Secret the OAuth callback must present when exchanging a Google profile for a token
    #[arg(long = "auth-exchange-secret", env = "REELTALK_AUTH_EXCHANGE_SECRET")]
    pub exchange_secret: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum message length in characters
    #[arg(long = "max-message-length", env = "REELTALK_MAX_MESSAGE_LENGTH", default_value_t = 10_000)]
    pub max_content_length: usize,

    /// Restrict reading, editing and deleting a message to its sender and recipient
    #[arg(
        long = "enforce-message-ownership",
        env = "REELTALK_ENFORCE_MESSAGE_OWNERSHIP",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enforce_ownership: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self { max_content_length: 10_000, enforce_ownership: true }
    }
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Buffered events per user room before slow connections start lagging
    #[arg(long = "room-capacity", env = "REELTALK_ROOM_CAPACITY", default_value_t = 64)]
    pub room_capacity: usize,

    /// Size of the per-connection outbound buffer
    #[arg(long = "ws-outbound-buffer-size", env = "REELTALK_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 32)]
    pub outbound_buffer_size: usize,

    /// How often to reclaim rooms that no longer have members
    #[arg(long = "room-gc-interval-secs", env = "REELTALK_ROOM_GC_INTERVAL_SECS", default_value_t = 60)]
    pub room_gc_interval_secs: u64,

    /// Private messages per second a single connection may send
    #[arg(long = "ws-messages-per-second", env = "REELTALK_WS_MESSAGES_PER_SECOND", default_value_t = 5)]
    pub messages_per_second: u32,

    /// Private messages a single connection may send in a burst
    #[arg(long = "ws-message-burst", env = "REELTALK_WS_MESSAGE_BURST", default_value_t = 10)]
    pub message_burst: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            room_capacity: 64,
            outbound_buffer_size: 32,
            room_gc_interval_secs: 60,
            messages_per_second: 5,
            message_burst: 10,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client
    #[arg(long = "rate-limit-per-second", env = "REELTALK_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance per client
    #[arg(long = "rate-limit-burst", env = "REELTALK_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check in milliseconds
    #[arg(long = "health-db-timeout-ms", env = "REELTALK_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { db_timeout_ms: 2000 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long = "log-format", env = "REELTALK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long = "log-level", env = "REELTALK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// OTLP collector endpoint; traces and metrics are only exported when set
    #[arg(long = "otlp-endpoint", env = "REELTALK_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { log_format: LogFormat::Text, log_level: "info".to_string(), otlp_endpoint: None }
    }
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
