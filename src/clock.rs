// src/clock.rs
//! Eastern-time clock used for output file names and record prefixes.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::{America::New_York, Tz};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Wall clock converted to America/New_York regardless of the host zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&New_York)
    }
}

// --- Test helper ---
/// Manually driven clock. Every `now()` returns the current instant and then
/// moves it forward by `step` (zero by default).
pub struct ManualClock {
    current: Mutex<DateTime<Tz>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Tz>) -> Self {
        Self {
            current: Mutex::new(start),
            step: Duration::zero(),
        }
    }

    /// Build from an Eastern-time wall reading; `None` if the reading does not
    /// exist or is ambiguous (DST transitions).
    pub fn at_eastern(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<Self> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .map(Self::new)
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn advance(&self, by: Duration) {
        let mut cur = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *cur += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        let mut cur = self.current.lock().unwrap_or_else(|p| p.into_inner());
        let out = *cur;
        *cur += self.step;
        out
    }
}
