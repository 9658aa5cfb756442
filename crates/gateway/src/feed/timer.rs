use chrono::{DateTime, Utc};
use oddsline_core::Timestamp;
use std::time::Duration;

/// One-shot deadline owned by exactly one driver.
///
/// Timers never fire on their own: the owner polls [`Timer::fire`] with the
/// current clock reading, and re-arms if it wants a period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timer {
    deadline: Option<Timestamp>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer to come due `after` from `now`
    pub fn arm(&mut self, now: Timestamp, after: Duration) {
        let deadline = chrono::Duration::from_std(after)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed
    pub fn fire(&mut self, now: Timestamp) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_deadline() {
        let now = Utc::now();
        let mut timer = Timer::new();
        timer.arm(now, Duration::from_secs(3));

        assert!(!timer.fire(now + chrono::Duration::seconds(2)));
        assert!(timer.is_armed());
        assert!(timer.fire(now + chrono::Duration::seconds(3)));
        assert!(!timer.is_armed());
        assert!(!timer.fire(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_cancel() {
        let now = Utc::now();
        let mut timer = Timer::new();
        timer.arm(now, Duration::ZERO);
        timer.cancel();
        assert!(!timer.fire(now));
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let now = Utc::now();
        let mut timer = Timer::new();
        timer.arm(now, Duration::MAX);
        assert_eq!(timer.deadline(), Some(DateTime::<Utc>::MAX_UTC));
    }
}
