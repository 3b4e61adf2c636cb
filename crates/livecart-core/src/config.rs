use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_QUEUE_CAPACITY: usize = 64; // Q: per-client send queue
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000; // W: per-frame write deadline
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_MISSED_PONGS: u32 = 2;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;
pub const DEFAULT_VIEWER_COUNT_DEBOUNCE_MS: u64 = 100;
pub const MAX_FRAME_BYTES: usize = 64 * 1024; // inbound control frames are tiny
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3_600;

/// Top-level config (livecart.toml + LIVECART_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LivecartConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Token a websocket client presents as `?admin=<token>` to receive
    /// admin-only events. No token configured means no admins.
    pub admin_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            admin_token: None,
        }
    }
}

/// Tunables for the websocket hub and per-client pumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_max_missed_pongs")]
    pub max_missed_pongs: u32,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_viewer_count_debounce_ms")]
    pub viewer_count_debounce_ms: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            max_missed_pongs: DEFAULT_MAX_MISSED_PONGS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            viewer_count_debounce_ms: DEFAULT_VIEWER_COUNT_DEBOUNCE_MS,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Label printing. Without a spool directory labels are only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelConfig {
    pub spool_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            signing_secret: default_signing_secret(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}
fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_max_missed_pongs() -> u32 {
    DEFAULT_MAX_MISSED_PONGS
}
fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}
fn default_viewer_count_debounce_ms() -> u64 {
    DEFAULT_VIEWER_COUNT_DEBOUNCE_MS
}
fn default_max_frame_bytes() -> usize {
    MAX_FRAME_BYTES
}
fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}
fn default_signing_secret() -> String {
    "change-me".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.livecart/livecart.db", home)
}

impl LivecartConfig {
    /// Load config from a TOML file with LIVECART_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `LIVECART_REALTIME__QUEUE_CAPACITY=128`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: LivecartConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LIVECART_").split("__"))
            .extract()
            .map_err(|e| crate::error::LivecartError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.livecart/livecart.toml", home)
}
