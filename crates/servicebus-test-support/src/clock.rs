//! Fixed clock for deterministic dates in tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use servicebus_core::clock::Clock;

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The instant `offset` after this clock's.
    #[must_use]
    pub fn later(self, offset: Duration) -> DateTime<Utc> {
        self.0 + offset
    }

    /// A clock `offset` after this one.
    #[must_use]
    pub fn advanced(self, offset: Duration) -> Self {
        Self(self.later(offset))
    }
}

impl Default for FixedClock {
    /// 2026-01-15T10:00:00Z.
    fn default() -> Self {
        Self(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
