//! Tokio channel-based transport for single-process use
//!
//! Each `open` hands a [`ChannelPeer`] to whoever holds the receiving end of
//! the connector. The peer plays the server: it accepts or refuses the
//! connection, pushes frames, reads what the client sent and can drop the
//! link. No sockets, no serialization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use super::{Connection, ConnectionId, Connector, EventSender, TransportEvent};

#[derive(Debug, Default)]
struct LinkState {
    open: AtomicBool,
    closed: AtomicBool,
}

impl LinkState {
    /// Returns true for the first caller only
    fn mark_closed(&self) -> bool {
        self.open.store(false, Ordering::Release);
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Channel-based connector
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<ChannelPeer>,
}

impl ChannelConnector {
    /// Create a connector and the receiver of server-side peers
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<ChannelPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers }, rx)
    }
}

impl Connector for ChannelConnector {
    fn open(&self, id: ConnectionId, events: EventSender) -> Box<dyn Connection> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState::default());

        let peer = ChannelPeer {
            id,
            events: events.clone(),
            outgoing: outgoing_rx,
            link: Arc::clone(&link),
        };
        if let Err(mpsc::error::SendError(peer)) = self.peers.send(peer) {
            peer.refuse("no server listening");
        }

        Box::new(ChannelConnection {
            id,
            outgoing: Some(outgoing_tx),
            events,
            link,
        })
    }

    fn name(&self) -> &str {
        "ChannelConnector"
    }
}

/// Client side of an in-process connection
pub struct ChannelConnection {
    id: ConnectionId,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    events: EventSender,
    link: Arc<LinkState>,
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: String) {
        if !self.link.open.load(Ordering::Acquire) {
            return;
        }
        if let Some(outgoing) = &self.outgoing {
            let _ = outgoing.send(payload);
        }
    }

    fn close(&mut self) {
        self.outgoing = None;
        if self.link.mark_closed() {
            let _ = self.events.send(TransportEvent::Closed {
                conn: self.id,
                reason: "closed by client".to_string(),
            });
        }
    }
}

/// Server side of an in-process connection
pub struct ChannelPeer {
    id: ConnectionId,
    events: EventSender,
    outgoing: mpsc::UnboundedReceiver<String>,
    link: Arc<LinkState>,
}

impl ChannelPeer {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Complete the handshake
    pub fn accept(&self) {
        if self.link.closed.load(Ordering::Acquire) {
            return;
        }
        self.link.open.store(true, Ordering::Release);
        let _ = self.events.send(TransportEvent::Opened { conn: self.id });
    }

    /// Fail the handshake
    pub fn refuse(self, reason: &str) {
        self.drop_connection(reason);
    }

    /// Deliver a text frame to the client
    pub fn push(&self, text: impl Into<String>) {
        if self.link.open.load(Ordering::Acquire) {
            let _ = self.events.send(TransportEvent::Frame {
                conn: self.id,
                text: text.into(),
            });
        }
    }

    /// Drop the link from the server side
    pub fn drop_connection(self, reason: &str) {
        if self.link.mark_closed() {
            let _ = self.events.send(TransportEvent::Closed {
                conn: self.id,
                reason: reason.to_string(),
            });
        }
    }

    /// Next payload sent by the client, `None` once the client closed
    pub async fn recv(&mut self) -> Option<String> {
        self.outgoing.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.outgoing.try_recv().ok()
    }

    pub fn is_open(&self) -> bool {
        self.link.open.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_push_and_send() {
        let (connector, mut peers) = ChannelConnector::pair();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let conn = connector.open(ConnectionId(1), events_tx);
        let mut peer = peers.recv().await.unwrap();

        // not open yet, dropped
        conn.send("early".into());

        peer.accept();
        assert_eq!(
            events.recv().await.unwrap(),
            TransportEvent::Opened {
                conn: ConnectionId(1)
            }
        );

        conn.send("hello".into());
        assert_eq!(peer.recv().await.unwrap(), "hello");
        assert!(peer.try_recv().is_none());

        peer.push("PONG");
        assert_eq!(
            events.recv().await.unwrap(),
            TransportEvent::Frame {
                conn: ConnectionId(1),
                text: "PONG".into()
            }
        );
    }

    #[tokio::test]
    async fn test_closed_reported_once() {
        let (connector, mut peers) = ChannelConnector::pair();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let mut conn = connector.open(ConnectionId(2), events_tx);
        let mut peer = peers.recv().await.unwrap();
        peer.accept();
        let _ = events.recv().await;

        conn.close();
        assert!(matches!(
            events.recv().await.unwrap(),
            TransportEvent::Closed { reason, .. } if reason == "closed by client"
        ));
        assert!(peer.is_closed());
        assert_eq!(peer.recv().await, None);

        peer.drop_connection("late");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_listener_refuses() {
        let (connector, peers) = ChannelConnector::pair();
        drop(peers);
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let _conn = connector.open(ConnectionId(3), events_tx);
        assert!(matches!(
            events.recv().await.unwrap(),
            TransportEvent::Closed { conn: ConnectionId(3), .. }
        ));
    }
}
