//! Time sources for token expiry and attempt windows.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Monotonic instant, used for attempt windows.
    fn now(&self) -> Instant;

    /// Wall-clock seconds since the UNIX epoch, used for token claims.
    fn unix_seconds(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Both readings advance together.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    start_unix: i64,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            start_unix: chrono::Utc::now().timestamp(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }

    fn unix_seconds(&self) -> i64 {
        self.start_unix + self.elapsed.lock().as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_both_readings() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let u0 = clock.unix_seconds();

        clock.advance(Duration::from_secs(61));

        assert_eq!(clock.now() - t0, Duration::from_secs(61));
        assert_eq!(clock.unix_seconds() - u0, 61);
    }

    #[test]
    fn manual_clock_is_frozen_otherwise() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }
}
