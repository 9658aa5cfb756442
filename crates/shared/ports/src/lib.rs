//! Oddsline Ports
//!
//! Port definitions (traits) for the oddsline live price feed.
//! These define the boundaries between the feed logic and infrastructure.

mod clock;
mod error;
mod quotes;

pub use clock::Clock;
pub use error::{QuoteError, QuoteResult};
pub use quotes::QuoteSource;
