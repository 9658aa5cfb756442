//! Oddsline Clock Infrastructure
//!
//! Provides time abstractions for production and tests:
//!
//! - [`SystemClock`]: wall-clock time, used by the running feed
//! - [`ManualClock`]: frozen time that only moves when advanced, used to drive
//!   keep-alive, backoff and fallback timers deterministically
//!
//! ## Usage
//!
//! ```ignore
//! use oddsline_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! let start = clock.now();
//! clock.advance(Duration::seconds(10));
//! assert_eq!(clock.now() - start, Duration::seconds(10));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use oddsline_ports::Clock;
