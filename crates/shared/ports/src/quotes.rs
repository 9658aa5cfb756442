use async_trait::async_trait;
use oddsline_core::{BookTop, MarketId};

use crate::error::QuoteResult;

/// Port for request/response price sources (e.g. an exchange REST order book)
///
/// Used by the polling fallback when the streaming connection is given up on.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the current top of book for one market
    async fn fetch_top(&self, market: &MarketId) -> QuoteResult<BookTop>;

    /// Get the source's name/identifier for debugging
    fn name(&self) -> &str {
        "QuoteSource"
    }
}
