use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::Odds;
use crate::values::{Price, Quantity};

/// Order book level (price + size)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Quantity,
}

impl BookLevel {
    /// Create a new book level
    pub fn new(price: Price, size: Quantity) -> Self {
        Self { price, size }
    }
}

/// Top of book: the best bid and best ask, either of which may be missing.
///
/// Only prices in (0, 1] make it in; an empty side is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BookTop {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

impl BookTop {
    pub fn new(best_bid: Option<Price>, best_ask: Option<Price>) -> Self {
        Self {
            best_bid: best_bid.filter(is_quotable),
            best_ask: best_ask.filter(is_quotable),
        }
    }

    /// Best bid is the highest quotable bid, best ask the lowest quotable ask.
    /// Level order on the wire is not relied upon.
    pub fn from_levels(bids: &[BookLevel], asks: &[BookLevel]) -> Self {
        fn quotable(levels: &[BookLevel]) -> impl Iterator<Item = Price> + '_ {
            levels.iter().map(|l| l.price).filter(is_quotable)
        }
        Self {
            best_bid: quotable(bids).max(),
            best_ask: quotable(asks).min(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.best_bid.is_none() && self.best_ask.is_none()
    }

    /// YES price implied by the top of book: the midpoint when both sides are
    /// quoted, otherwise whichever single side is present.
    pub fn yes_price(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => bid.checked_add(ask).map(|sum| sum / Decimal::TWO),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    /// Odds implied by the top of book, `None` if the price fails the validity gate.
    pub fn odds(&self) -> Option<Odds> {
        self.yes_price()
            .and_then(|p| p.to_f64())
            .and_then(Odds::from_yes)
    }
}

/// A share pays at most $1, so a price outside (0, 1] is not a quote
fn is_quotable(price: &Price) -> bool {
    *price > Decimal::ZERO && *price <= Decimal::ONE
}
