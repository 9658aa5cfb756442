use oddsline_core::Timestamp;
use std::time::Duration;

use super::timer::Timer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    pub interval: Duration,
    /// Literal token sent while the connection is open
    pub ping: String,
    /// Literal token the server answers with
    pub pong: String,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            ping: "PING".to_string(),
            pong: "PONG".to_string(),
        }
    }
}

/// Periodic liveness probe. Only runs between `start` (on open) and `stop`
/// (on any transition away from open).
pub struct KeepAlive {
    config: KeepAliveConfig,
    timer: Timer,
}

impl KeepAlive {
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            timer: Timer::new(),
        }
    }

    pub fn start(&mut self, now: Timestamp) {
        self.timer.arm(now, self.config.interval);
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.timer.deadline()
    }

    /// Returns the probe to send if one is due, and schedules the next one.
    pub fn poll(&mut self, now: Timestamp) -> Option<&str> {
        if self.timer.fire(now) {
            self.timer.arm(now, self.config.interval);
            Some(&self.config.ping)
        } else {
            None
        }
    }
}
