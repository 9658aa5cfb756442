//! Error types for the gateway crate
//!
//! None of these cross the public subscribe boundary: transport failures become
//! close events, quote failures become skipped ticks.

use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Closed by server: {0}")]
    ClosedByServer(String),

    #[error("Stream ended")]
    StreamEnded,

    #[error("Channel closed")]
    ChannelClosed,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
