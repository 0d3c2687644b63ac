//! Wall-clock abstraction.
//!
//! Snooze deadlines, reminder due times and provider backoff are stored as
//! UTC timestamps taken from a [`Clock`]. Window policy evaluation needs the
//! user's local wall time, which the clock also provides. Timers that only
//! measure elapsed time use `tokio::time::Instant` instead.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock reading of `at` in the user's timezone.
    fn wall_time(&self, at: DateTime<Utc>) -> NaiveDateTime;

    /// Wall-clock reading of the current instant.
    fn local_now(&self) -> NaiveDateTime {
        self.wall_time(self.now())
    }
}

/// The system clock, reporting wall time in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn wall_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&Local).naive_local()
    }
}

/// A manually driven clock whose wall time is UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wall_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc()
    }
}
