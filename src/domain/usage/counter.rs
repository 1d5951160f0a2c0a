//! Daily usage counter entity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::UsageKind;

/// Daily allowance per usage kind for users without an active entitlement
pub const FREE_DAILY_LIMIT: u32 = 2;

/// Per-user, per-day AI usage counter.
///
/// Counts belong to `day` (UTC). A counter whose `day` differs from the
/// current day is stale and reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub day: NaiveDate,
    pub transcription_count: u32,
    pub natural_input_count: u32,
}

impl UsageCounter {
    /// Fresh counter for `day`
    pub const fn new(day: NaiveDate) -> Self {
        Self {
            day,
            transcription_count: 0,
            natural_input_count: 0,
        }
    }

    pub const fn count(&self, kind: UsageKind) -> u32 {
        match kind {
            UsageKind::Transcription => self.transcription_count,
            UsageKind::NaturalInput => self.natural_input_count,
        }
    }

    fn count_mut(&mut self, kind: UsageKind) -> &mut u32 {
        match kind {
            UsageKind::Transcription => &mut self.transcription_count,
            UsageKind::NaturalInput => &mut self.natural_input_count,
        }
    }

    /// Counter as seen on `today`: unchanged if current, zeroed otherwise
    pub fn as_of(&self, today: NaiveDate) -> Self {
        if self.day == today {
            *self
        } else {
            Self::new(today)
        }
    }

    /// Reset both counts when the day has rolled over.
    /// Returns true if a reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.day == today {
            return false;
        }
        *self = Self::new(today);
        true
    }

    /// Whether another `kind` action fits today's allowance
    pub fn is_available(&self, kind: UsageKind, today: NaiveDate, unlimited: bool) -> bool {
        unlimited || self.as_of(today).count(kind) < FREE_DAILY_LIMIT
    }

    /// Check-and-increment rule applied atomically by the data store.
    ///
    /// Rolls over first, then bypasses the cap for unlimited users, then
    /// increments only while under [`FREE_DAILY_LIMIT`]. A denial leaves the
    /// counts untouched (the rollover reset still applies).
    pub fn try_increment(&mut self, kind: UsageKind, today: NaiveDate, unlimited: bool) -> bool {
        self.roll_over(today);

        let count = self.count_mut(kind);
        if unlimited {
            *count = count.saturating_add(1);
            return true;
        }
        if *count < FREE_DAILY_LIMIT {
            *count += 1;
            return true;
        }
        false
    }
}
