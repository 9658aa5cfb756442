//! Oddsline Gateway
//!
//! Live price feed for binary-outcome markets. Provides:
//! - One shared WebSocket connection to the exchange market channel, no
//!   matter how many markets are being watched
//! - Subscription multiplexing with batched announcements
//! - Keep-alive, bounded exponential reconnect, and a polling fallback once
//!   the retry budget is spent
//! - A frame decoder turning loosely shaped exchange JSON into YES/NO odds
//!
//! ## Architecture
//!
//! ```text
//!   UI / callers
//!        │ subscribe(market, callback) / subscribe_stream(market)
//!   ┌────▼──────────┐
//!   │PriceFeedHandle│  (cloneable, never fails)
//!   └────┬──────────┘
//!        │ commands
//!   ┌────▼────┐   actions   ┌───────────┐
//!   │ Driver  │────────────►│ Connector │──► wss://…/ws/market
//!   │  task   │◄────────────│ (ws)      │
//!   └────┬────┘   events    └───────────┘
//!        │                  ┌───────────┐
//!        │ FetchQuotes ────►│QuoteSource│──► GET /book?token_id=…
//!   ┌────▼──────┐           └───────────┘
//!   │FeedMachine│  registry · keep-alive · reconnect · fallback
//!   └───────────┘
//! ```
//!
//! ## Testing
//!
//! [`feed::FeedMachine`] does no I/O and reads time from an injected clock, so
//! the whole lifecycle can be driven step by step with a manual clock. The
//! [`transport::ChannelConnector`] replaces the socket for in-process tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod feed;
pub mod messages;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use adapters::ClobRestClient;
pub use config::{FallbackMode, FeedConfig, FeedConfigFile, load_config, load_default_config};
pub use error::{ConfigError, TransportError};
pub use feed::{FeedMachine, FeedStatus, Phase};
pub use messages::{Frame, FrameDecoder, SubscribeRequest};
pub use service::{PriceFeed, PriceFeedHandle, PriceStream, PriceSubscription};
pub use transport::{ConnectionId, ConnectionState, Connector, WsConnector};
