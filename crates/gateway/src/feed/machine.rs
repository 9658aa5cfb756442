//! Feed state machine
//!
//! Owns the registry and every driver (keep-alive, reconnect backoff, polling
//! fallback) and reacts to named inputs. It performs no I/O: side effects are
//! queued as [`Action`]s for the driver task to execute, and timers are plain
//! deadlines read against the injected [`Clock`].
//!
//! ```text
//!            subscribe                 opened
//!   Idle ─────────────► Connecting ─────────────► Open
//!    ▲                   │    ▲                    │
//!    │ drained           │    │ backoff elapsed    │ closed
//!    │                   ▼    │                    ▼
//!    └──────────────── Backoff ◄───────────────────┘
//!                        │
//!                        │ budget spent
//!                        ▼
//!                     Fallback ── force_reconnect ──► Connecting
//! ```

use oddsline_core::{BookTop, MarketId, Odds, Timestamp};
use oddsline_ports::{Clock, QuoteResult};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::fallback::PollingFallback;
use super::keepalive::KeepAlive;
use super::reconnect::{ReconnectDecision, ReconnectPolicy};
use super::registry::{DEFAULT_YES_PRICE, Listener, ListenerId, Registry, Removal};
use crate::config::{FallbackMode, FeedConfig};
use crate::messages::{Frame, FrameDecoder, SubscribeRequest};
use crate::transport::{ConnectionId, ConnectionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Open,
    Backoff,
    Fallback,
}

/// Side effect requested by the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new connection under this id
    Connect(ConnectionId),
    Send { conn: ConnectionId, payload: String },
    Close(ConnectionId),
    /// Poll the REST order book for these markets and report via `on_quote`
    FetchQuotes(Vec<MarketId>),
}

/// Snapshot published to observers after every input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStatus {
    pub phase: Phase,
    pub subscriptions: usize,
    pub reconnect_attempts: u32,
}

impl FeedStatus {
    pub fn is_live(&self) -> bool {
        self.phase == Phase::Open
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: ConnectionId,
    state: ConnectionState,
}

pub struct FeedMachine {
    clock: Arc<dyn Clock>,
    decoder: FrameDecoder,
    registry: Registry,
    keepalive: KeepAlive,
    reconnect: ReconnectPolicy,
    fallback: PollingFallback,
    /// The one connection that is connecting or open
    connection: Option<Slot>,
    /// Connection we asked to close and whose `Closed` is still outstanding
    closing: Option<ConnectionId>,
    next_connection: u64,
    /// Markets with a REST poll outstanding; at most one per market
    quotes_in_flight: HashSet<MarketId>,
    actions: VecDeque<Action>,
}

impl FeedMachine {
    pub fn new(config: &FeedConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            decoder: FrameDecoder::new(config.keepalive.pong.clone()),
            registry: Registry::new(),
            keepalive: KeepAlive::new(config.keepalive.clone()),
            reconnect: ReconnectPolicy::new(config.reconnect.clone()),
            fallback: PollingFallback::new(config.fallback.clone()),
            connection: None,
            closing: None,
            next_connection: 1,
            quotes_in_flight: HashSet::new(),
            actions: VecDeque::new(),
        }
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Register a listener. Returns true if this is the first listener of
    /// `market`.
    pub fn subscribe(&mut self, market: MarketId, listener: Listener) -> bool {
        debug!(market = %market, listener = %listener.id, "subscribe");
        let created = self.registry.insert(market, listener);

        match self.phase() {
            Phase::Idle => self.connect(),
            Phase::Open if created => self.announce(),
            // Connecting announces on open; Backoff and Fallback wait for
            // their timer or an explicit reconnect
            _ => {}
        }
        created
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, market: &MarketId, id: ListenerId) -> bool {
        match self.registry.remove(market, id) {
            Removal::NotFound => false,
            Removal::ListenerRemoved => true,
            Removal::SubscriptionDropped => {
                debug!(market = %market, "subscription dropped");
                if self.registry.is_empty() {
                    self.teardown();
                } else {
                    self.announce();
                }
                true
            }
        }
    }

    pub fn on_opened(&mut self, conn: ConnectionId) {
        let current = matches!(
            self.connection,
            Some(Slot { id, state: ConnectionState::Connecting }) if id == conn
        );
        if !current {
            debug!(conn = %conn, "superseded connection opened, closing it");
            self.actions.push_back(Action::Close(conn));
            return;
        }

        let now = self.clock.now();
        self.connection = Some(Slot {
            id: conn,
            state: ConnectionState::Open,
        });
        self.reconnect.on_success();
        self.keepalive.start(now);
        if self.fallback.is_active() {
            self.fallback.deactivate();
            info!("connection restored, polling fallback stopped");
        }
        info!(conn = %conn, subscriptions = self.registry.len(), "connection open");
        self.announce();
    }

    pub fn on_closed(&mut self, conn: ConnectionId, reason: &str) {
        if self.closing == Some(conn) {
            self.closing = None;
            debug!(conn = %conn, "connection closed");
            return;
        }
        let Some(slot) = self.connection.filter(|slot| slot.id == conn) else {
            trace!(conn = %conn, "ignoring close of superseded connection");
            return;
        };

        self.connection = None;
        self.keepalive.stop();

        if slot.state == ConnectionState::Open {
            warn!(conn = %conn, reason, "connection lost");
        } else {
            warn!(conn = %conn, reason, "connect failed");
        }

        if !self.registry.is_empty() {
            self.schedule_reconnect();
        }
    }

    /// Decode and dispatch one inbound frame. Returns how many callbacks ran.
    pub fn on_frame(&mut self, conn: ConnectionId, text: &str) -> usize {
        let current = matches!(
            self.connection,
            Some(Slot { id, state: ConnectionState::Open }) if id == conn
        );
        if !current {
            trace!(conn = %conn, "ignoring frame from superseded connection");
            return 0;
        }

        let mut delivered = 0;
        for frame in self.decoder.decode(text) {
            match frame {
                Frame::KeepAlive => trace!("keep-alive reply"),
                Frame::ServerError(message) => debug!(error = %message, "server error frame"),
                Frame::Unrecognized => debug!(len = text.len(), "discarding unrecognized frame"),
                Frame::Book { .. } | Frame::Scalar { .. } => {
                    delivered += self.dispatch_frame(&frame);
                }
            }
        }
        delivered
    }

    /// Result of a REST poll requested with [`Action::FetchQuotes`]. Only the
    /// reply to the outstanding poll of `market` is accepted.
    pub fn on_quote(&mut self, market: &MarketId, quote: QuoteResult<BookTop>) -> usize {
        if !self.quotes_in_flight.remove(market) {
            trace!(market = %market, "unrequested quote, dropping");
            return 0;
        }
        if !self.fallback.is_active() {
            trace!(market = %market, "fallback inactive, dropping quote");
            return 0;
        }
        match quote {
            Ok(top) => match top.odds() {
                Some(odds) => self.registry.dispatch(market, odds),
                None => {
                    debug!(market = %market, ?top, "polled book has no usable price");
                    0
                }
            },
            Err(e) => {
                warn!(market = %market, error = %e, "quote poll failed");
                0
            }
        }
    }

    /// Fire every timer that is due
    pub fn on_tick(&mut self) {
        let now = self.clock.now();

        if self.reconnect.poll(now) && !self.registry.is_empty() {
            info!(attempt = self.reconnect.attempts(), "backoff elapsed, reconnecting");
            self.connect();
        }

        if let Some(ping) = self.keepalive.poll(now).map(str::to_owned) {
            if let Some(Slot { id, state: ConnectionState::Open }) = self.connection {
                trace!(conn = %id, "keep-alive");
                self.actions.push_back(Action::Send { conn: id, payload: ping });
            }
        }

        if self.fallback.poll(now) {
            self.fallback_tick();
        }
    }

    /// Reset the retry budget and connect now, even from fallback
    pub fn force_reconnect(&mut self) {
        if self.registry.is_empty() {
            debug!("force_reconnect with no subscriptions, ignoring");
            return;
        }
        if matches!(self.phase(), Phase::Connecting | Phase::Open) {
            debug!(phase = ?self.phase(), "force_reconnect while connected, ignoring");
            return;
        }
        info!("forced reconnect");
        self.reconnect.reset();
        self.connect();
    }

    /// Drop every subscription and stop everything
    pub fn shutdown(&mut self) {
        info!(subscriptions = self.registry.len(), "shutting down feed");
        self.registry.clear();
        self.teardown();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> Phase {
        match self.connection {
            Some(Slot { state: ConnectionState::Connecting, .. }) => Phase::Connecting,
            Some(Slot { state: ConnectionState::Open, .. }) => Phase::Open,
            _ if self.fallback.is_active() => Phase::Fallback,
            _ if self.reconnect.is_pending() => Phase::Backoff,
            _ => Phase::Idle,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        match (self.connection, self.closing) {
            (Some(slot), _) => slot.state,
            (None, Some(_)) => ConnectionState::Closing,
            (None, None) => ConnectionState::Disconnected,
        }
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            phase: self.phase(),
            subscriptions: self.registry.len(),
            reconnect_attempts: self.reconnect.attempts(),
        }
    }

    pub fn latest(&self, market: &MarketId) -> Option<Odds> {
        self.registry.latest(market)
    }

    pub fn subscriptions(&self) -> usize {
        self.registry.len()
    }

    /// Earliest armed timer, if any
    pub fn next_deadline(&self) -> Option<Timestamp> {
        [
            self.keepalive.deadline(),
            self.reconnect.deadline(),
            self.fallback.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Number of armed timers across all drivers
    pub fn pending_timers(&self) -> usize {
        [
            self.keepalive.deadline(),
            self.reconnect.deadline(),
            self.fallback.deadline(),
        ]
        .iter()
        .filter(|d| d.is_some())
        .count()
    }

    pub fn drain_actions(&mut self) -> Vec<Action> {
        self.actions.drain(..).collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn connect(&mut self) {
        if self.connection.is_some() {
            return;
        }
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connection = Some(Slot {
            id,
            state: ConnectionState::Connecting,
        });
        info!(conn = %id, "connecting");
        self.actions.push_back(Action::Connect(id));
    }

    /// One message carrying every subscribed identifier
    fn announce(&mut self) {
        let Some(Slot { id, state: ConnectionState::Open }) = self.connection else {
            return;
        };
        if self.registry.is_empty() {
            return;
        }
        let markets = self.registry.market_ids();
        match SubscribeRequest::market(&markets).to_json() {
            Ok(payload) => {
                debug!(conn = %id, markets = markets.len(), "announcing subscriptions");
                self.actions.push_back(Action::Send { conn: id, payload });
            }
            Err(e) => warn!(error = %e, "failed to encode subscription"),
        }
    }

    fn schedule_reconnect(&mut self) {
        let now = self.clock.now();
        match self.reconnect.on_failure(now) {
            ReconnectDecision::Retry { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            }
            ReconnectDecision::GiveUp => {
                if self.fallback.activate(now) {
                    warn!(
                        attempts = self.reconnect.attempts(),
                        mode = ?self.fallback.mode(),
                        "reconnect budget spent, switching to polling fallback"
                    );
                }
            }
        }
    }

    fn teardown(&mut self) {
        self.keepalive.stop();
        self.fallback.deactivate();
        self.reconnect.reset();
        if let Some(slot) = self.connection.take() {
            self.closing = Some(slot.id);
            self.actions.push_back(Action::Close(slot.id));
        }
        info!("feed idle");
    }

    fn dispatch_frame(&mut self, frame: &Frame) -> usize {
        let Some(market) = frame.asset_id() else {
            return 0;
        };
        match frame.odds() {
            Some(odds) => self.registry.dispatch(market, odds),
            None => {
                debug!(market = %market, "price outside (0, 1), dropped");
                0
            }
        }
    }

    fn fallback_tick(&mut self) {
        match self.fallback.mode() {
            FallbackMode::Simulated => {
                for market in self.registry.market_ids() {
                    let current = self
                        .registry
                        .last_yes(&market)
                        .unwrap_or(DEFAULT_YES_PRICE);
                    let next = self.fallback.step(current);
                    if let Some(odds) = Odds::from_yes(next) {
                        self.registry.dispatch(&market, odds);
                    }
                }
            }
            FallbackMode::Rest => {
                let markets: Vec<MarketId> = self
                    .registry
                    .market_ids()
                    .into_iter()
                    .filter(|market| self.quotes_in_flight.insert(market.clone()))
                    .collect();
                if !markets.is_empty() {
                    self.actions.push_back(Action::FetchQuotes(markets));
                }
            }
        }
    }
}
