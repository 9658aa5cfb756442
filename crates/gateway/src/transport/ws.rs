//! WebSocket transport over tokio-tungstenite

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use super::{Connection, ConnectionId, Connector, EventSender, TransportEvent};
use crate::error::TransportError;

/// Connects to a fixed WebSocket endpoint
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self, id: ConnectionId, events: EventSender) -> Box<dyn Connection> {
        let (writer, outgoing) = mpsc::unbounded_channel();
        let url = self.url.clone();
        let timeout = self.connect_timeout;

        tokio::spawn(async move {
            let reason = match run_connection(id, &url, timeout, outgoing, &events).await {
                Ok(()) => "closed by client".to_string(),
                Err(e) => e.to_string(),
            };
            debug!(conn = %id, %reason, "connection finished");
            let _ = events.send(TransportEvent::Closed { conn: id, reason });
        });

        Box::new(WsConnection {
            id,
            writer: Some(writer),
        })
    }

    fn name(&self) -> &str {
        "WsConnector"
    }
}

/// Writer side of a socket task. Outgoing payloads go through an unbounded
/// queue; dropping the queue makes the task send a close frame and exit.
pub struct WsConnection {
    id: ConnectionId,
    writer: Option<mpsc::UnboundedSender<String>>,
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: String) {
        if let Some(writer) = &self.writer {
            // Receiver gone means the socket task already ended
            let _ = writer.send(payload);
        }
    }

    fn close(&mut self) {
        self.writer = None;
    }
}

async fn run_connection(
    id: ConnectionId,
    url: &str,
    timeout: Duration,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: &EventSender,
) -> Result<(), TransportError> {
    let (stream, _response) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| TransportError::ConnectTimeout(timeout))??;

    events
        .send(TransportEvent::Opened { conn: id })
        .map_err(|_| TransportError::ChannelClosed)?;

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            payload = outgoing.recv() => match payload {
                Some(payload) => {
                    trace!(conn = %id, %payload, "send");
                    write.send(Message::Text(payload.into())).await?;
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events
                        .send(TransportEvent::Frame { conn: id, text: text.as_str().to_owned() })
                        .map_err(|_| TransportError::ChannelClosed)?;
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(text) = String::from_utf8(data.to_vec()) {
                        events
                            .send(TransportEvent::Frame { conn: id, text })
                            .map_err(|_| TransportError::ChannelClosed)?;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(TransportError::ClosedByServer(reason));
                }
                // Ping/Pong frames are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::StreamEnded),
            },
        }
    }
}
