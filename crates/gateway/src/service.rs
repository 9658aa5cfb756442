//! Price feed service
//!
//! [`PriceFeed::spawn`] starts one driver task that owns the [`FeedMachine`]
//! and the single shared connection. Callers talk to it through a cloneable
//! [`PriceFeedHandle`]; every call returns immediately and nothing fails
//! across the subscribe boundary.

use futures_util::Stream;
use oddsline_clock::SystemClock;
use oddsline_core::{BookTop, MarketId, Odds};
use oddsline_ports::{Clock, QuoteResult, QuoteSource};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::adapters::ClobRestClient;
use crate::config::FeedConfig;
use crate::feed::{Action, FeedMachine, FeedStatus, Listener, ListenerId, PriceCallback};
use crate::transport::{Connection, ConnectionId, Connector, TransportEvent, WsConnector};

enum Command {
    Subscribe {
        market: MarketId,
        listener: Listener,
    },
    Unsubscribe {
        market: MarketId,
        id: ListenerId,
    },
    ForceReconnect,
    Latest {
        market: MarketId,
        reply: oneshot::Sender<Option<Odds>>,
    },
    Shutdown,
}

pub struct PriceFeed;

impl PriceFeed {
    /// Start a feed against the configured WebSocket and REST endpoints.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: FeedConfig) -> PriceFeedHandle {
        let connector = Arc::new(WsConnector::new(
            config.ws_url.clone(),
            config.connect_timeout,
        ));
        let quotes = match ClobRestClient::with_timeout(config.rest_url.clone(), config.connect_timeout)
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "falling back to default HTTP client");
                ClobRestClient::new(config.rest_url.clone())
            }
        };
        Self::spawn_with(config, Arc::new(SystemClock), connector, Arc::new(quotes))
    }

    /// Start a feed with explicit collaborators
    pub fn spawn_with(
        config: FeedConfig,
        clock: Arc<dyn Clock>,
        connector: Arc<dyn Connector>,
        quotes: Arc<dyn QuoteSource>,
    ) -> PriceFeedHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (quotes_tx, quotes_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(FeedStatus::default());

        info!(
            connector = connector.name(),
            quotes = quotes.name(),
            ws_url = %config.ws_url,
            "price feed started"
        );

        let driver = Driver {
            machine: FeedMachine::new(&config, clock.clone()),
            clock,
            connector,
            quotes,
            connections: HashMap::new(),
            events_tx,
            quotes_tx,
            status: status_tx,
        };
        tokio::spawn(driver.run(commands_rx, events_rx, quotes_rx));

        PriceFeedHandle {
            inner: Arc::new(HandleInner {
                commands: commands_tx,
                next_listener: AtomicU64::new(1),
                status: status_rx,
            }),
        }
    }
}

struct HandleInner {
    commands: mpsc::UnboundedSender<Command>,
    next_listener: AtomicU64,
    status: watch::Receiver<FeedStatus>,
}

impl HandleInner {
    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Cloneable handle to a running feed. The feed shuts down once every
/// handle and every subscription is gone, or on [`PriceFeedHandle::shutdown`].
#[derive(Clone)]
pub struct PriceFeedHandle {
    inner: Arc<HandleInner>,
}

impl PriceFeedHandle {
    /// Call `callback(yes, no)` on every price update for `market` until the
    /// returned subscription is unsubscribed or dropped.
    pub fn subscribe<F>(&self, market: impl Into<MarketId>, callback: F) -> PriceSubscription
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        let market = market.into();
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let active = Arc::new(AtomicBool::new(true));
        let callback: PriceCallback = Arc::new(callback);

        let accepted = self.inner.send(Command::Subscribe {
            market: market.clone(),
            listener: Listener::new(id, callback, Arc::clone(&active)),
        });
        if !accepted {
            debug!(market = %market, "feed stopped, subscription is inert");
            active.store(false, Ordering::Release);
        }

        PriceSubscription {
            market,
            id,
            active,
            feed: Arc::clone(&self.inner),
        }
    }

    /// Price updates for `market` as a stream; dropping it unsubscribes.
    pub fn subscribe_stream(&self, market: impl Into<MarketId>) -> PriceStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(market, move |yes, _no| {
            if let Some(odds) = Odds::from_yes(yes) {
                let _ = tx.send(odds);
            }
        });
        PriceStream {
            updates: rx,
            subscription,
        }
    }

    /// Last price dispatched for `market`, `None` before any data arrived
    pub async fn latest(&self, market: impl Into<MarketId>) -> Option<Odds> {
        let (reply, rx) = oneshot::channel();
        if !self.inner.send(Command::Latest {
            market: market.into(),
            reply,
        }) {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Try the socket again right away with a fresh retry budget
    pub fn force_reconnect(&self) {
        self.inner.send(Command::ForceReconnect);
    }

    /// Drop every subscription and stop the feed
    pub fn shutdown(&self) {
        self.inner.send(Command::Shutdown);
    }

    pub fn status(&self) -> FeedStatus {
        *self.inner.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<FeedStatus> {
        self.inner.status.clone()
    }

    /// True while the socket is open
    pub fn is_live(&self) -> bool {
        self.status().is_live()
    }

    /// Resolves once the driver task has stopped
    pub async fn closed(&self) {
        let mut status = self.inner.status.clone();
        while status.changed().await.is_ok() {}
    }
}

/// Disposer returned by [`PriceFeedHandle::subscribe`].
///
/// Unsubscribing is idempotent and takes effect immediately: no callback
/// starts after it returns, even for updates already queued in the driver.
pub struct PriceSubscription {
    market: MarketId,
    id: ListenerId,
    active: Arc<AtomicBool>,
    feed: Arc<HandleInner>,
}

impl PriceSubscription {
    pub fn market(&self) -> &MarketId {
        &self.market
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.feed.send(Command::Unsubscribe {
                market: self.market.clone(),
                id: self.id,
            });
        }
    }
}

impl Drop for PriceSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Stream of [`Odds`] for one market.
///
/// Ends when the feed shuts down.
pub struct PriceStream {
    updates: mpsc::UnboundedReceiver<Odds>,
    subscription: PriceSubscription,
}

impl PriceStream {
    pub fn market(&self) -> &MarketId {
        self.subscription.market()
    }
}

impl Stream for PriceStream {
    type Item = Odds;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Odds>> {
        self.updates.poll_recv(cx)
    }
}

struct Driver {
    machine: FeedMachine,
    clock: Arc<dyn Clock>,
    connector: Arc<dyn Connector>,
    quotes: Arc<dyn QuoteSource>,
    connections: HashMap<ConnectionId, Box<dyn Connection>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    quotes_tx: mpsc::UnboundedSender<(MarketId, QuoteResult<BookTop>)>,
    status: watch::Sender<FeedStatus>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut quotes: mpsc::UnboundedReceiver<(MarketId, QuoteResult<BookTop>)>,
    ) {
        loop {
            let wait = self.time_to_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = events.recv() => self.handle_event(event),
                Some((market, quote)) = quotes.recv() => {
                    self.machine.on_quote(&market, quote);
                }
                _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {
                    self.machine.on_tick();
                }
            }

            self.execute();
            self.status.send_replace(self.machine.status());
        }

        self.machine.shutdown();
        self.execute();
        self.status.send_replace(self.machine.status());
        info!("price feed stopped");
    }

    fn time_to_deadline(&self) -> Option<Duration> {
        let deadline = self.machine.next_deadline()?;
        Some((deadline - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe { market, listener } => {
                self.machine.subscribe(market, listener);
            }
            Command::Unsubscribe { market, id } => {
                self.machine.unsubscribe(&market, id);
            }
            Command::ForceReconnect => self.machine.force_reconnect(),
            Command::Latest { market, reply } => {
                let _ = reply.send(self.machine.latest(&market));
            }
            Command::Shutdown => self.machine.shutdown(),
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened { conn } => self.machine.on_opened(conn),
            TransportEvent::Frame { conn, text } => {
                self.machine.on_frame(conn, &text);
            }
            TransportEvent::Closed { conn, reason } => {
                self.connections.remove(&conn);
                self.machine.on_closed(conn, &reason);
            }
        }
    }

    fn execute(&mut self) {
        for action in self.machine.drain_actions() {
            match action {
                Action::Connect(id) => {
                    let connection = self.connector.open(id, self.events_tx.clone());
                    self.connections.insert(id, connection);
                }
                Action::Send { conn, payload } => {
                    if let Some(connection) = self.connections.get(&conn) {
                        connection.send(payload);
                    }
                }
                Action::Close(conn) => {
                    if let Some(mut connection) = self.connections.remove(&conn) {
                        connection.close();
                    }
                }
                Action::FetchQuotes(markets) => {
                    for market in markets {
                        let quotes = Arc::clone(&self.quotes);
                        let tx = self.quotes_tx.clone();
                        tokio::spawn(async move {
                            let quote = quotes.fetch_top(&market).await;
                            let _ = tx.send((market, quote));
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackMode;
    use crate::feed::{FallbackConfig, KeepAliveConfig, Phase, ReconnectConfig};
    use crate::transport::{ChannelConnector, ChannelPeer};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use oddsline_ports::QuoteError;
    use rust_decimal_macros::dec;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    struct FixedQuotes(BookTop);

    #[async_trait]
    impl QuoteSource for FixedQuotes {
        async fn fetch_top(&self, market: &MarketId) -> QuoteResult<BookTop> {
            if market.as_str() == "broken" {
                Err(QuoteError::Status(500))
            } else {
                Ok(self.0)
            }
        }
    }

    fn fast_config(mode: FallbackMode) -> FeedConfig {
        FeedConfig::default()
            .with_keepalive(KeepAliveConfig {
                interval: Duration::from_millis(50),
                ..KeepAliveConfig::default()
            })
            .with_reconnect(ReconnectConfig {
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(40),
                max_attempts: 2,
            })
            .with_fallback(FallbackConfig {
                mode,
                interval: Duration::from_millis(20),
                volatility: 0.01,
                seed: Some(11),
            })
    }

    fn start(mode: FallbackMode) -> (PriceFeedHandle, mpsc::UnboundedReceiver<ChannelPeer>) {
        let (connector, peers) = ChannelConnector::pair();
        let quotes = FixedQuotes(BookTop::new(Some(dec!(0.20)), Some(dec!(0.30))));
        let handle = PriceFeed::spawn_with(
            fast_config(mode),
            Arc::new(SystemClock),
            Arc::new(connector),
            Arc::new(quotes),
        );
        (handle, peers)
    }

    fn collector() -> (
        impl Fn(f64, f64) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<(f64, f64)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |yes, no| {
                let _ = tx.send((yes, no));
            },
            rx,
        )
    }

    async fn next_peer(peers: &mut mpsc::UnboundedReceiver<ChannelPeer>) -> ChannelPeer {
        timeout(WAIT, peers.recv()).await.unwrap().unwrap()
    }

    async fn wait_for_phase(handle: &PriceFeedHandle, phase: Phase) {
        let mut status = handle.watch_status();
        timeout(WAIT, status.wait_for(|s| s.phase == phase))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_announce_and_dispatch() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let (callback, mut prices) = collector();
        let _sub = feed.subscribe("tok", callback);

        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        let announce = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
        assert!(announce.contains("\"tok\""));
        wait_for_phase(&feed, Phase::Open).await;
        assert!(feed.is_live());

        peer.push(r#"{"asset_id":"tok","bids":[["0.40","1"]],"asks":[["0.60","1"]]}"#);
        assert_eq!(timeout(WAIT, prices.recv()).await.unwrap(), Some((0.5, 0.5)));
        assert_eq!(feed.latest("tok").await.unwrap().yes(), 0.5);
    }

    #[tokio::test]
    async fn test_keepalive_ping_reaches_server() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let (callback, _prices) = collector();
        let _sub = feed.subscribe("tok", callback);

        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        let _announce = timeout(WAIT, peer.recv()).await.unwrap();
        assert_eq!(timeout(WAIT, peer.recv()).await.unwrap().as_deref(), Some("PING"));
    }

    #[tokio::test]
    async fn test_dropping_last_subscription_closes_connection() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let (callback, _prices) = collector();
        let sub = feed.subscribe("tok", callback);

        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        let _announce = timeout(WAIT, peer.recv()).await.unwrap();

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        // client side closed: the outgoing queue ends
        loop {
            match timeout(WAIT, peer.recv()).await.unwrap() {
                Some(_ping) => continue,
                None => break,
            }
        }
        wait_for_phase(&feed, Phase::Idle).await;
        assert_eq!(feed.status().subscriptions, 0);
    }

    #[tokio::test]
    async fn test_price_stream() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let mut stream = feed.subscribe_stream("tok");
        assert_eq!(stream.market().as_str(), "tok");

        let peer = next_peer(&mut peers).await;
        peer.accept();
        wait_for_phase(&feed, Phase::Open).await;

        peer.push(r#"{"asset_id":"tok","price":"0.25"}"#);
        let odds = timeout(WAIT, stream.next()).await.unwrap().unwrap();
        assert_eq!(odds.pair(), (0.25, 0.75));

        feed.shutdown();
        assert_eq!(timeout(WAIT, stream.next()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refusals_fall_back_then_force_reconnect() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let (callback, mut prices) = collector();
        let _sub = feed.subscribe("tok", callback);

        // initial attempt plus two retries
        for _ in 0..3 {
            next_peer(&mut peers).await.refuse("401 unauthorized");
        }
        wait_for_phase(&feed, Phase::Fallback).await;

        let (yes, no) = timeout(WAIT, prices.recv()).await.unwrap().unwrap();
        assert!((0.01..=0.99).contains(&yes));
        assert!((no - (1.0 - yes)).abs() < 1e-12);

        feed.force_reconnect();
        let peer = next_peer(&mut peers).await;
        peer.accept();
        wait_for_phase(&feed, Phase::Open).await;
        assert_eq!(feed.status().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn test_rest_fallback_polls_quote_source() {
        let (feed, mut peers) = start(FallbackMode::Rest);
        let (callback, mut prices) = collector();
        let _sub = feed.subscribe("tok", callback);
        let (broken, mut broken_prices) = collector();
        let _broken = feed.subscribe("broken", broken);

        for _ in 0..3 {
            next_peer(&mut peers).await.refuse("refused");
        }
        wait_for_phase(&feed, Phase::Fallback).await;

        assert_eq!(
            timeout(WAIT, prices.recv()).await.unwrap(),
            Some((0.25, 0.75))
        );
        assert!(broken_prices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_driver() {
        let (feed, mut peers) = start(FallbackMode::Simulated);
        let (callback, _prices) = collector();
        let sub = feed.subscribe("tok", callback);
        let peer = next_peer(&mut peers).await;
        peer.accept();
        wait_for_phase(&feed, Phase::Open).await;

        feed.shutdown();
        timeout(WAIT, feed.closed()).await.unwrap();
        assert_eq!(feed.status().phase, Phase::Idle);
        assert!(peer.is_closed());

        // nothing panics after the driver is gone
        let (callback, _) = collector();
        let late = feed.subscribe("late", callback);
        assert!(!late.is_active());
        sub.unsubscribe();
        assert_eq!(feed.latest("tok").await, None);
    }
}
