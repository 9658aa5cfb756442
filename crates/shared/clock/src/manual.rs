use chrono::{Duration, Utc};
use oddsline_core::Timestamp;
use oddsline_ports::Clock;
use parking_lot::RwLock;
use std::sync::Arc;

/// Clock frozen in time until explicitly moved
///
/// Timers keyed off this clock only come due when a test advances it, which makes
/// backoff, keep-alive and fallback schedules reproducible.
pub struct ManualClock {
    current_time: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a new manual clock
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Arc<Self> {
        Arc::new(Self {
            current_time: RwLock::new(initial_time.unwrap_or_else(Utc::now)),
        })
    }

    /// Advance the time by a specified duration
    pub fn advance(&self, duration: Duration) {
        *self.current_time.write() += duration;
    }

    /// Advance by a std duration (convenience for timer configs)
    pub fn advance_std(&self, duration: std::time::Duration) {
        // Saturate rather than fail on absurd inputs
        let step = Duration::from_std(duration).unwrap_or(Duration::MAX);
        self.advance(step);
    }

    /// Explicitly set the time
    ///
    /// Warning: This can cause time discontinuities. Use with caution.
    pub fn set_time(&self, time: Timestamp) {
        *self.current_time.write() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current_time.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
