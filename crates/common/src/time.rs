use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

pub const NANOSECONDS_PER_MILLISECOND: i64 = 1_000_000;
pub const NANOSECONDS_PER_SECOND: i64 = 1_000_000_000;

/// Snapshot of both clocks taken at the same instant. Peers use it to map
/// steady-clock readings back onto wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub system_clock_count: i64,
    pub steady_clock_count: i64,
}

/// Source of nanosecond timestamps for the broker.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds since the unix epoch.
    fn now(&self) -> i64;

    /// The clock base this clock was anchored to.
    fn base(&self) -> TimeBase;
}

fn system_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Wall-clock anchored at construction, advanced by the monotonic clock so
/// readings never go backwards. The steady count of the base is zero: steady
/// readings are offsets from the anchor.
pub struct SystemClock {
    base: TimeBase,
    anchor: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            base: TimeBase {
                system_clock_count: system_nanos(),
                steady_clock_count: 0,
            },
            anchor: Instant::now(),
        }
    }

    /// Nanoseconds elapsed on the steady clock since this clock was created.
    pub fn steady_nanos(&self) -> i64 {
        self.anchor.elapsed().as_nanos() as i64
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        self.base.system_clock_count + self.steady_nanos()
    }

    fn base(&self) -> TimeBase {
        self.base
    }
}

/// Clock driven by hand, for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn base(&self) -> TimeBase {
        TimeBase {
            system_clock_count: self.now(),
            steady_clock_count: 0,
        }
    }
}
