//! Clock abstraction for stamping accepted messages.
//!
//! Acceptance timestamps come from the server clock. Production code uses
//! `RealClock`; tests inject a `TestClock` to make timestamps deterministic.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use chrono::{DateTime, TimeZone, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current system time.
    fn now_system(&self) -> SystemTime;

    /// Returns the current time as a UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now_system())
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// advance it while the application holds another.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Microseconds since the UNIX epoch
    micros: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock frozen at the current system time.
    pub fn new() -> Self {
        Self::with_start_time(Utc::now())
    }

    /// Creates a test clock frozen at `start`.
    pub fn with_start_time(start: DateTime<Utc>) -> Self {
        Self { micros: Arc::new(AtomicI64::new(start.timestamp_micros())) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        self.micros.fetch_add(micros, Ordering::AcqRel);
    }

    /// Jumps to an arbitrary point in time, forwards or backwards.
    pub fn jump_to(&self, time: DateTime<Utc>) {
        self.micros.store(time.timestamp_micros(), Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::from(self.now_utc())
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::Acquire);
        Utc.timestamp_micros(micros).single().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_frozen_until_advanced() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_utc(), start);
        assert_eq!(clock.now_utc(), start);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now_utc(), start + chrono::Duration::seconds(90));
    }

    #[test]
    fn clones_share_time() {
        let clock = TestClock::new();
        let handle = clock.clone();
        let before = handle.now_utc();

        clock.advance(Duration::from_millis(5));
        assert_eq!(handle.now_utc() - before, chrono::Duration::milliseconds(5));
    }

    #[test]
    fn jump_can_go_backwards() {
        let clock = TestClock::new();
        let target = Utc.with_ymd_and_hms(2000, 6, 1, 0, 0, 0).unwrap();

        clock.jump_to(target);
        assert_eq!(clock.now_utc(), target);
        assert_eq!(clock.now_system(), SystemTime::from(target));
    }

    #[test]
    fn real_clock_tracks_system_time() {
        let before = Utc::now();
        let now = RealClock::new().now_utc();
        assert!(now >= before);
    }
}
