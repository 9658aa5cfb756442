use std::time::Duration;

use super::types::FeedConfigFile;
use crate::feed::{FallbackConfig, KeepAliveConfig, ReconnectConfig};

/// Runtime configuration of a price feed, with durations resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_url: String,
    pub connect_timeout: Duration,
    pub keepalive: KeepAliveConfig,
    pub reconnect: ReconnectConfig,
    pub fallback: FallbackConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfigFile::default().to_feed_config()
    }
}

impl FeedConfig {
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_keepalive(mut self, keepalive: KeepAliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }
}

impl FeedConfigFile {
    pub fn to_feed_config(&self) -> FeedConfig {
        FeedConfig {
            ws_url: self.ws_url.clone(),
            rest_url: self.rest_url.clone(),
            connect_timeout: self.connect_timeout(),
            keepalive: KeepAliveConfig {
                interval: Duration::from_millis(self.keepalive.interval_ms),
                ping: self.keepalive.ping.clone(),
                pong: self.keepalive.pong.clone(),
            },
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                max_attempts: self.reconnect.max_attempts,
            },
            fallback: FallbackConfig {
                mode: self.fallback.mode,
                interval: Duration::from_millis(self.fallback.interval_ms),
                volatility: self.fallback.volatility,
                seed: self.fallback.seed,
            },
        }
    }
}
