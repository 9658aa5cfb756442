//! Oddsline Runner
//!
//! Command-line front end for the live price feed: resolves configuration
//! from a JSON file plus flags, subscribes to the requested markets and logs
//! every tick until interrupted.

pub mod cli;
pub mod monitor;

pub use cli::{Args, FallbackArg};
pub use monitor::{MarketWatch, log_status_changes};
