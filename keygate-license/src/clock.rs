//! Wall-clock access and rollback detection.
//!
//! The validator keeps a high-water mark: the latest wall-clock time it has
//! ever observed. A reading earlier than the mark means the clock was set
//! back, and the license is reported as expired until real time catches up.
//!
//! The mark is kept both in the activation snapshot and in the registry
//! database. This only mitigates casual tampering: anyone who rewrites both
//! files and the clock together can still rewind it.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for simulations and tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Sets the current time, forwards or backwards.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    /// Moves the clock by `delta` (negative to roll back).
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Outcome of comparing the clock with the high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockVerdict {
    /// The clock is at or past the mark; `now` is the new mark.
    Advanced(DateTime<Utc>),
    /// The clock reads earlier than the mark.
    RolledBack {
        /// Previously observed high-water mark.
        last_seen: DateTime<Utc>,
        /// Current reading.
        now: DateTime<Utc>,
    },
}

/// Stateless rollback check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockGuard;

impl ClockGuard {
    /// Compares `now` with the last observed time.
    #[must_use]
    pub fn check(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> ClockVerdict {
        if now < last_seen {
            ClockVerdict::RolledBack { last_seen, now }
        } else {
            ClockVerdict::Advanced(now)
        }
    }

    /// Like [`check`](Self::check), but a rolled-back clock is an error.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::ClockTampered`] when `now` is before `last_seen`.
    pub fn ensure(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> LicenseResult<DateTime<Utc>> {
        match Self::check(last_seen, now) {
            ClockVerdict::Advanced(now) => Ok(now),
            ClockVerdict::RolledBack { .. } => Err(LicenseError::ClockTampered),
        }
    }

    /// Returns the mark to record when `now` is observed after `previous`.
    #[must_use]
    pub fn high_water(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        previous.map_or(now, |p| p.max(now))
    }
}
