//! Reconnection policy for the shared price connection.
//!
//! Bounded exponential backoff with a small retry budget. Once the budget is
//! spent the policy gives up and the caller hands over to the polling fallback
//! instead of hammering an endpoint that may want credentials we don't have.

use oddsline_core::Timestamp;
use std::time::Duration;

use super::timer::Timer;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Number of reconnect attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl ReconnectConfig {
    /// Backoff before attempt `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Outcome of reporting a connection failure to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Backoff timer armed; reconnect when it fires
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted
    GiveUp,
}

/// Tracks reconnection attempts and owns the backoff timer.
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
    backoff: Timer,
}

impl ReconnectPolicy {
    /// Creates a new policy with the given configuration.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            backoff: Timer::new(),
        }
    }

    /// Records a failed or dropped connection.
    ///
    /// Arms the backoff timer and returns `Retry` while attempts remain,
    /// `GiveUp` once `max_attempts` retries have been scheduled.
    pub fn on_failure(&mut self, now: Timestamp) -> ReconnectDecision {
        if self.attempts >= self.config.max_attempts {
            self.backoff.cancel();
            return ReconnectDecision::GiveUp;
        }

        let delay = self.config.delay_for(self.attempts);
        self.attempts += 1;
        self.backoff.arm(now, delay);

        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Resets the attempt counter after a successful connection.
    pub fn on_success(&mut self) {
        self.reset();
    }

    /// Clears the attempt counter and cancels any pending backoff.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.backoff.cancel();
    }

    /// True once the pending backoff has elapsed; the caller should connect.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        self.backoff.fire(now)
    }

    /// Returns true while a backoff timer is armed.
    pub fn is_pending(&self) -> bool {
        self.backoff.is_armed()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.backoff.deadline()
    }

    /// Returns the number of reconnection attempts scheduled since the last success.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts,
        }
    }

    #[test]
    fn test_reconnect_backoff() {
        let now = Utc::now();
        let mut policy = ReconnectPolicy::new(config(3));

        assert_eq!(
            policy.on_failure(now),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
        assert_eq!(
            policy.on_failure(now),
            ReconnectDecision::Retry {
                attempt: 2,
                delay: Duration::from_millis(2000)
            }
        );
        assert_eq!(
            policy.on_failure(now),
            ReconnectDecision::Retry {
                attempt: 3,
                delay: Duration::from_millis(4000)
            }
        );
        assert_eq!(policy.on_failure(now), ReconnectDecision::GiveUp);
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn test_backoff_monotonic_and_capped() {
        let cfg = ReconnectConfig {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: 40,
        };

        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let delay = cfg.delay_for(attempt);
            assert!(delay >= previous, "attempt {attempt}");
            assert!(delay <= cfg.max_delay);
            previous = delay;
        }
        assert_eq!(cfg.delay_for(3), Duration::from_millis(5000));
        assert_eq!(cfg.delay_for(39), Duration::from_millis(5000));
    }

    #[test]
    fn test_attempts_never_exceed_max() {
        let now = Utc::now();
        let mut policy = ReconnectPolicy::new(config(3));

        for _ in 0..10 {
            policy.on_failure(now);
            assert!(policy.attempts() <= 3);
        }
        assert_eq!(policy.on_failure(now), ReconnectDecision::GiveUp);
        assert!(!policy.is_pending());
    }

    #[test]
    fn test_reconnect_reset() {
        let now = Utc::now();
        let mut policy = ReconnectPolicy::new(config(3));

        policy.on_failure(now);
        policy.on_failure(now);
        assert_eq!(policy.attempts(), 2);
        assert!(policy.is_pending());

        policy.on_success();
        assert_eq!(policy.attempts(), 0);
        assert!(!policy.is_pending());
        assert!(matches!(
            policy.on_failure(now),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_backoff_timer_fires_after_delay() {
        let now = Utc::now();
        let mut policy = ReconnectPolicy::new(config(3));

        policy.on_failure(now);
        assert!(!policy.poll(now + chrono::Duration::milliseconds(999)));
        assert!(policy.poll(now + chrono::Duration::milliseconds(1000)));
        assert!(!policy.is_pending());
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        let mut policy = ReconnectPolicy::new(config(0));
        assert_eq!(policy.on_failure(Utc::now()), ReconnectDecision::GiveUp);
    }
}
