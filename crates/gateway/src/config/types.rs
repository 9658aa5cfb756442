use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the price feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfigFile {
    /// Market-channel WebSocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST base URL (order book endpoint for the `rest` fallback)
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Give up on a connection attempt after this long
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub keepalive: KeepAliveConfigJson,
    #[serde(default)]
    pub reconnect: ReconnectConfigJson,
    #[serde(default)]
    pub fallback: FallbackConfigJson,
}

impl Default for FeedConfigFile {
    fn default() -> Self {
        FeedConfigFile {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            connect_timeout_ms: default_connect_timeout(),
            keepalive: KeepAliveConfigJson::default(),
            reconnect: ReconnectConfigJson::default(),
            fallback: FallbackConfigJson::default(),
        }
    }
}

/// Keep-alive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfigJson {
    #[serde(default = "default_keepalive_interval")]
    pub interval_ms: u64,
    /// Literal liveness token sent to the server
    #[serde(default = "default_ping")]
    pub ping: String,
    /// Literal reply token, discarded on receipt
    #[serde(default = "default_pong")]
    pub pong: String,
}

impl Default for KeepAliveConfigJson {
    fn default() -> Self {
        KeepAliveConfigJson {
            interval_ms: default_keepalive_interval(),
            ping: default_ping(),
            pong: default_pong(),
        }
    }
}

/// Reconnection backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfigJson {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfigJson {
    fn default() -> Self {
        ReconnectConfigJson {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Where fallback ticks get their prices from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Bounded random walk around the last known price
    #[default]
    Simulated,
    /// Poll the exchange REST order book
    Rest,
}

/// Polling fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfigJson {
    #[serde(default)]
    pub mode: FallbackMode,
    #[serde(default = "default_fallback_interval")]
    pub interval_ms: u64,
    /// Width of the random-walk step; each tick moves at most half of it either way
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Seed for reproducible simulated prices
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for FallbackConfigJson {
    fn default() -> Self {
        FallbackConfigJson {
            mode: FallbackMode::default(),
            interval_ms: default_fallback_interval(),
            volatility: default_volatility(),
            seed: None,
        }
    }
}

impl FeedConfigFile {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}

fn default_rest_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_keepalive_interval() -> u64 {
    10_000
}

fn default_ping() -> String {
    "PING".to_string()
}

fn default_pong() -> String {
    "PONG".to_string()
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_fallback_interval() -> u64 {
    3_000
}

fn default_volatility() -> f64 {
    0.01
}
