//! Subscription registry: market id → listeners interested in its price.
//!
//! Pure data, no I/O. Insertion order of markets is kept so the batched
//! announcement lists identifiers in the order they were first subscribed.

use indexmap::IndexMap;
use oddsline_core::{MarketId, Odds};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Seed for the simulated random walk before any real price is known
pub const DEFAULT_YES_PRICE: f64 = 0.5;

/// Receives `(yes, no)` with `no == 1 - yes`.
pub type PriceCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// One registered callback.
///
/// `active` is shared with the caller's disposer, which clears it
/// synchronously. Dispatch checks the flag right before invoking, so a
/// listener that was unsubscribed while an update was already queued is
/// never called again.
#[derive(Clone)]
pub struct Listener {
    pub id: ListenerId,
    callback: PriceCallback,
    active: Arc<AtomicBool>,
}

impl Listener {
    pub fn new(id: ListenerId, callback: PriceCallback, active: Arc<AtomicBool>) -> Self {
        Self {
            id,
            callback,
            active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Debug)]
pub struct Subscription {
    pub market: MarketId,
    listeners: Vec<Listener>,
    /// Starting point of the simulated walk, follows live prices too
    last_yes: f64,
    /// Last price actually dispatched
    latest: Option<Odds>,
}

impl Subscription {
    fn new(market: MarketId) -> Self {
        Self {
            market,
            listeners: Vec::new(),
            last_yes: DEFAULT_YES_PRICE,
            latest: None,
        }
    }
}

/// Result of removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Unknown market or listener; nothing changed
    NotFound,
    /// Listener gone, other listeners keep the subscription alive
    ListenerRemoved,
    /// Last listener gone, subscription deleted
    SubscriptionDropped,
}

#[derive(Debug, Default)]
pub struct Registry {
    subscriptions: IndexMap<MarketId, Subscription>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener, creating the subscription if needed.
    /// Returns true if the market was not subscribed before.
    pub fn insert(&mut self, market: MarketId, listener: Listener) -> bool {
        let mut created = false;
        let subscription = self.subscriptions.entry(market).or_insert_with_key(|m| {
            created = true;
            Subscription::new(m.clone())
        });
        subscription.listeners.push(listener);
        created
    }

    pub fn remove(&mut self, market: &MarketId, id: ListenerId) -> Removal {
        let Some(subscription) = self.subscriptions.get_mut(market) else {
            return Removal::NotFound;
        };
        let Some(pos) = subscription.listeners.iter().position(|l| l.id == id) else {
            return Removal::NotFound;
        };

        let listener = subscription.listeners.remove(pos);
        listener.deactivate();

        if subscription.listeners.is_empty() {
            self.subscriptions.shift_remove(market);
            Removal::SubscriptionDropped
        } else {
            Removal::ListenerRemoved
        }
    }

    /// All subscribed markets, in first-subscribed order
    pub fn market_ids(&self) -> Vec<MarketId> {
        self.subscriptions.keys().cloned().collect()
    }

    /// Invoke every still-active listener of `market` with `odds`.
    ///
    /// Returns how many callbacks ran. A panicking callback is logged and
    /// does not stop the others.
    pub fn dispatch(&mut self, market: &MarketId, odds: Odds) -> usize {
        let Some(subscription) = self.subscriptions.get_mut(market) else {
            return 0;
        };
        subscription.last_yes = odds.yes();
        subscription.latest = Some(odds);

        let (yes, no) = odds.pair();
        let mut delivered = 0;
        for listener in &subscription.listeners {
            if !listener.is_active() {
                continue;
            }
            let callback = &listener.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(yes, no))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(market = %market, listener = %listener.id, "price callback panicked"),
            }
        }
        delivered
    }

    pub fn last_yes(&self, market: &MarketId) -> Option<f64> {
        self.subscriptions.get(market).map(|s| s.last_yes)
    }

    pub fn latest(&self, market: &MarketId) -> Option<Odds> {
        self.subscriptions.get(market).and_then(|s| s.latest)
    }

    /// Drop every subscription, deactivating all listeners
    pub fn clear(&mut self) {
        for subscription in self.subscriptions.values() {
            for listener in &subscription.listeners {
                listener.deactivate();
            }
        }
        self.subscriptions.clear();
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
