//! Oddsline Core Domain
//!
//! Pure domain types for the oddsline live price feed.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{BookLevel, BookTop, MarketId, Odds};
pub use values::{Price, Quantity, Timestamp};
