//! Time sources for the presence service.
//!
//! Two kinds of time are needed: a monotonic instant for idle
//! bookkeeping, and a wall-clock timestamp stamped on outbound events.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync + 'static {
    /// Monotonic now, used for last-seen and idle checks.
    fn now(&self) -> Instant;

    /// Wall-clock now, used for event timestamps.
    fn wall(&self) -> DateTime<Utc>;
}

/// The real clock.
///
/// `now` goes through Tokio's clock, so `tokio::time::pause()` in tests
/// freezes idle bookkeeping along with the sweep timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one and hand another to
/// the service.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new((Instant::now(), Utc::now()))),
        }
    }

    /// Moves both clocks forward by `by`, stopping at the latest
    /// representable time instead of overflowing.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(now) = guard.0.checked_add(by) {
            guard.0 = now;
        }
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        guard.1 = guard.1.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn wall(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_both_clocks() {
        let clock = ManualClock::new();
        let (t0, w0) = (clock.now(), clock.wall());

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now() - t0, Duration::from_secs(90));
        assert_eq!((clock.wall() - w0).num_seconds(), 90);
    }

    #[test]
    fn test_manual_clock_huge_advance_saturates() {
        let clock = ManualClock::new();
        let t0 = clock.now();

        clock.advance(Duration::MAX);
        clock.advance(Duration::MAX);

        assert!(clock.now() >= t0);
        assert_eq!(clock.wall(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), other.now());
    }
}
