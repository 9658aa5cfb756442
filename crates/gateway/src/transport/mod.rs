//! Transport abstraction layer
//!
//! A [`Connector`] opens one connection per [`ConnectionId`] and reports its
//! lifecycle as [`TransportEvent`]s on a shared channel. The feed never talks
//! to a socket directly, so the WebSocket implementation can be swapped for
//! the in-process channel transport in tests.

pub mod channel;
pub mod ws;

pub use channel::{ChannelConnector, ChannelPeer};
pub use ws::WsConnector;

use std::fmt;
use tokio::sync::mpsc;

/// Identity of one connection attempt. Every attempt gets a fresh id so
/// events from superseded connections can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Lifecycle and data events raised by a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened { conn: ConnectionId },
    Frame { conn: ConnectionId, text: String },
    /// Raised exactly once per connection, whether it failed to open,
    /// dropped, or was closed by us.
    Closed { conn: ConnectionId, reason: String },
}

impl TransportEvent {
    pub fn conn(&self) -> ConnectionId {
        match self {
            TransportEvent::Opened { conn }
            | TransportEvent::Frame { conn, .. }
            | TransportEvent::Closed { conn, .. } => *conn,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Opens outbound connections to the price endpoint
pub trait Connector: Send + Sync {
    /// Start connecting. Completion is reported as `Opened` or `Closed`.
    fn open(&self, id: ConnectionId, events: EventSender) -> Box<dyn Connection>;

    fn name(&self) -> &str {
        "Connector"
    }
}

/// Handle to one live (or still connecting) connection
pub trait Connection: Send {
    fn id(&self) -> ConnectionId;

    /// Fire-and-forget. Dropped silently if the connection is not open.
    fn send(&self, payload: String);

    /// Start an orderly close; `Closed` follows on the event channel.
    fn close(&mut self);
}
