//! # Time Oracle
//!
//! The runtime reads the clock exactly once per transaction and hands the
//! value to the program; clients never supply a timestamp.
//!
//! - [`SystemClock`] wraps wall-clock time and clamps it so it never goes
//!   backwards, even if the host's NTP daemon steps the clock.
//! - [`ManualClock`] is for tests and local devnets; it only moves forward.

use parking_lot::Mutex;
use thiserror::Error;

/// Errors from a time source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("time source unavailable: {0}")]
    Unavailable(String),

    #[error("clock cannot move backwards: now {current}, requested {requested}")]
    Backwards { current: i64, requested: i64 },
}

/// A source of unix timestamps (seconds).
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    ///
    /// # Errors
    ///
    /// [`ClockError::Unavailable`] if the source cannot produce a sane value.
    fn unix_timestamp(&self) -> Result<i64, ClockError>;
}

// ---------------------------------------------------------------------------
// SystemClock
// ---------------------------------------------------------------------------

/// Wall-clock time, made monotonic.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<i64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> Result<i64, ClockError> {
        let now = chrono::Utc::now().timestamp();
        if now < 0 {
            return Err(ClockError::Unavailable(format!(
                "system time {now} is before the unix epoch"
            )));
        }
        let mut last = self.last.lock();
        if now < *last {
            tracing::warn!(now, last = *last, "system clock stepped backwards; holding");
            return Ok(*last);
        }
        *last = now;
        Ok(now)
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<i64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move time forward by `secs`. Negative values are ignored.
    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock();
        *now = now.saturating_add(secs.max(0));
    }

    /// Jump to an absolute time.
    ///
    /// # Errors
    ///
    /// [`ClockError::Backwards`] if `timestamp` is earlier than the current
    /// reading.
    pub fn warp_to(&self, timestamp: i64) -> Result<(), ClockError> {
        let mut now = self.now.lock();
        if timestamp < *now {
            return Err(ClockError::Backwards {
                current: *now,
                requested: timestamp,
            });
        }
        *now = timestamp;
        Ok(())
    }
}

impl Clock for ManualClock {
    fn unix_timestamp(&self) -> Result<i64, ClockError> {
        Ok(*self.now.lock())
    }
}
