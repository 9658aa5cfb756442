//! Polling fallback driver.
//!
//! Takes over once the reconnect budget is spent so subscribers keep
//! receiving prices. In `Simulated` mode every tick applies a bounded random
//! walk to each market's last known YES price; in `Rest` mode the owner is
//! asked to poll the exchange order book instead.

use oddsline_core::Timestamp;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::timer::Timer;
use crate::config::FallbackMode;

/// Lower clamp for simulated prices
pub const MIN_SIMULATED_PRICE: f64 = 0.01;
/// Upper clamp for simulated prices
pub const MAX_SIMULATED_PRICE: f64 = 0.99;

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackConfig {
    pub mode: FallbackMode,
    pub interval: Duration,
    /// Step width; one tick moves the price by at most `volatility / 2`
    pub volatility: f64,
    pub seed: Option<u64>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            mode: FallbackMode::Simulated,
            interval: Duration::from_secs(3),
            volatility: 0.01,
            seed: None,
        }
    }
}

pub struct PollingFallback {
    config: FallbackConfig,
    timer: Timer,
    active: bool,
    rng: StdRng,
}

impl PollingFallback {
    pub fn new(config: FallbackConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            timer: Timer::new(),
            active: false,
            rng,
        }
    }

    /// Start ticking. Returns false if already active; a repeated
    /// activation never adds a second timer.
    pub fn activate(&mut self, now: Timestamp) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.timer.arm(now, self.config.interval);
        true
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.timer.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.timer.deadline()
    }

    /// True if a tick is due; the next one is scheduled before returning.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        if self.active && self.timer.fire(now) {
            self.timer.arm(now, self.config.interval);
            true
        } else {
            false
        }
    }

    pub fn mode(&self) -> FallbackMode {
        self.config.mode
    }

    /// Next simulated YES price after `current`
    pub fn step(&mut self, current: f64) -> f64 {
        random_walk(current, self.config.volatility, &mut self.rng)
    }
}

/// One bounded random-walk step, clamped to
/// `[MIN_SIMULATED_PRICE, MAX_SIMULATED_PRICE]`.
pub fn random_walk<R: Rng + ?Sized>(current: f64, volatility: f64, rng: &mut R) -> f64 {
    let start = if current.is_finite() { current } else { 0.5 };
    let change = (rng.r#gen::<f64>() - 0.5) * volatility;
    (start + change).clamp(MIN_SIMULATED_PRICE, MAX_SIMULATED_PRICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seeded(seed: u64) -> FallbackConfig {
        FallbackConfig {
            seed: Some(seed),
            ..FallbackConfig::default()
        }
    }

    #[test]
    fn test_random_walk_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for start in [0.0, 0.01, 0.2, 0.5, 0.99, 1.0, -3.0, 42.0, f64::NAN] {
            let mut price = start;
            for _ in 0..2_000 {
                price = random_walk(price, 0.5, &mut rng);
                assert!(
                    (MIN_SIMULATED_PRICE..=MAX_SIMULATED_PRICE).contains(&price),
                    "start {start} walked to {price}"
                );
            }
        }
    }

    #[test]
    fn test_step_is_small() {
        let mut fallback = PollingFallback::new(seeded(1));
        let mut price = 0.5;
        for _ in 0..500 {
            let next = fallback.step(price);
            assert!((next - price).abs() <= 0.005 + f64::EPSILON);
            price = next;
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let mut a = PollingFallback::new(seeded(99));
        let mut b = PollingFallback::new(seeded(99));
        for _ in 0..20 {
            assert_eq!(a.step(0.4), b.step(0.4));
        }
    }

    #[test]
    fn test_activation_is_idempotent() {
        let now = Utc::now();
        let mut fallback = PollingFallback::new(seeded(1));

        assert!(fallback.activate(now));
        let deadline = fallback.deadline();
        assert!(!fallback.activate(now + chrono::Duration::seconds(1)));
        assert_eq!(fallback.deadline(), deadline);
    }

    #[test]
    fn test_ticks_on_interval_until_deactivated() {
        let now = Utc::now();
        let mut fallback = PollingFallback::new(seeded(1));
        fallback.activate(now);

        assert!(!fallback.poll(now + chrono::Duration::seconds(2)));
        assert!(fallback.poll(now + chrono::Duration::seconds(3)));
        assert!(fallback.poll(now + chrono::Duration::seconds(6)));

        fallback.deactivate();
        assert!(!fallback.is_active());
        assert_eq!(fallback.deadline(), None);
        assert!(!fallback.poll(now + chrono::Duration::seconds(60)));
    }
}
