// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wall-clock and id-generation ports.
//!
//! The core never reads ambient time directly: timestamps and generated ids
//! come from these ports so hosts can substitute deterministic sources.

use std::cell::Cell;
use std::rc::Rc;
use time::OffsetDateTime;

/// Source of wall-clock timestamps.
pub trait Clock {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;

    /// Current time in whole milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64 {
        unix_millis(self.now())
    }
}

/// Convert a timestamp to whole milliseconds since the Unix epoch (0 before the epoch).
pub fn unix_millis(at: OffsetDateTime) -> u64 {
    u64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
}

/// System clock backed by `OffsetDateTime::now_utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for replays and tests. Clones share one time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<OffsetDateTime>>,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Start the clock at `millis` since the Unix epoch.
    pub fn at_millis(millis: u64) -> Self {
        let nanos = i128::from(millis) * 1_000_000;
        let start = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self::new(start)
    }

    /// Move the clock forward by `millis`.
    pub fn advance_millis(&self, millis: u64) {
        let step = time::Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX));
        self.now.set(self.now.get().saturating_add(step));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

/// Generator for fresh employee ids.
pub trait IdSource {
    /// Produce an id candidate. Callers retry while the candidate is taken.
    fn next_id(&mut self, now_millis: u64) -> String;
}

/// Time-based ids of the form `emp-<millis>`, suffixed `-<n>` when the same
/// millisecond is issued more than once in a session.
#[derive(Debug, Clone, Default)]
pub struct TimeIdSource {
    last_millis: u64,
    repeat: u32,
}

impl IdSource for TimeIdSource {
    fn next_id(&mut self, now_millis: u64) -> String {
        if now_millis == self.last_millis {
            self.repeat += 1;
            format!("emp-{now_millis}-{}", self.repeat)
        } else {
            self.last_millis = now_millis;
            self.repeat = 0;
            format!("emp-{now_millis}")
        }
    }
}
