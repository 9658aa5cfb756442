use std::path::Path;
use url::Url;

use super::types::FeedConfigFile;
use crate::error::ConfigError;

/// Load feed configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FeedConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<FeedConfigFile, ConfigError> {
    let config: FeedConfigFile = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<FeedConfigFile, ConfigError> {
    let default_config = include_str!("feed_config.json");
    load_config_from_str(default_config)
}

impl FeedConfigFile {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = Url::parse(&self.ws_url)
            .map_err(|e| ConfigError::Invalid(format!("ws_url {:?}: {}", self.ws_url, e)))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "ws_url must use ws:// or wss://, got {}://",
                ws.scheme()
            )));
        }

        Url::parse(&self.rest_url)
            .map_err(|e| ConfigError::Invalid(format!("rest_url {:?}: {}", self.rest_url, e)))?;

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("connect_timeout_ms must be > 0".into()));
        }
        if self.keepalive.interval_ms == 0 {
            return Err(ConfigError::Invalid("keepalive.interval_ms must be > 0".into()));
        }
        if self.keepalive.ping.trim().is_empty() {
            return Err(ConfigError::Invalid("keepalive.ping must not be empty".into()));
        }
        // the decoder compares trimmed frames against it
        if self.keepalive.pong.trim().is_empty() {
            return Err(ConfigError::Invalid("keepalive.pong must not be empty".into()));
        }
        if self.fallback.interval_ms == 0 {
            return Err(ConfigError::Invalid("fallback.interval_ms must be > 0".into()));
        }
        // Wider than the clamp band makes every step saturate
        if !(self.fallback.volatility > 0.0 && self.fallback.volatility < 0.98) {
            return Err(ConfigError::Invalid(format!(
                "fallback.volatility must be in (0, 0.98), got {}",
                self.fallback.volatility
            )));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(
                "reconnect.base_delay_ms must not exceed reconnect.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackMode;

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert!(config.ws_url.starts_with("wss://"));
        assert_eq!(config.fallback.mode, FallbackMode::Simulated);
    }

    #[test]
    fn test_rejects_http_ws_url() {
        let err = load_config_from_str(r#"{ "ws_url": "https://example.com/ws" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let err = load_config_from_str(r#"{ "ws_url": "not a url" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let err = load_config_from_str(r#"{ "keepalive": { "interval_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = load_config_from_str(r#"{ "fallback": { "interval_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_blank_keepalive_tokens() {
        for json in [
            r#"{ "keepalive": { "ping": "" } }"#,
            r#"{ "keepalive": { "pong": "" } }"#,
            r#"{ "keepalive": { "pong": "  " } }"#,
        ] {
            let err = load_config_from_str(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{json}");
        }
    }

    #[test]
    fn test_rejects_bad_volatility() {
        for v in ["0", "-0.1", "0.98", "2.0"] {
            let json = format!(r#"{{ "fallback": {{ "volatility": {v} }} }}"#);
            assert!(load_config_from_str(&json).is_err(), "volatility {v}");
        }
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let json = r#"{ "reconnect": { "base_delay_ms": 5000, "max_delay_ms": 1000 } }"#;
        assert!(load_config_from_str(json).is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = load_config_from_str("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
