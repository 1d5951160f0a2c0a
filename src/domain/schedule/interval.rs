//! Interval value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::IntervalParseError;

/// Default background sync interval (5 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5 * 60;

/// Default hard timeout for a single sync (10 seconds)
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;

/// Value object representing a positive time interval.
/// Immutable and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    milliseconds: u64,
}

impl Interval {
    /// Create an Interval from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { milliseconds: ms }
    }

    /// Create an Interval from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            milliseconds: secs * 1000,
        }
    }

    /// Default periodic sync interval
    pub const fn default_sync_interval() -> Self {
        Self::from_secs(DEFAULT_SYNC_INTERVAL_SECS)
    }

    /// Default sync timeout
    pub const fn default_sync_timeout() -> Self {
        Self::from_secs(DEFAULT_SYNC_TIMEOUT_SECS)
    }

    pub const fn as_secs(&self) -> u64 {
        self.milliseconds / 1000
    }

    pub const fn as_millis(&self) -> u64 {
        self.milliseconds
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_millis(self.milliseconds)
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    /// Parse "30s", "5m", "1m30s" (case-insensitive, surrounding whitespace ignored)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();
        let invalid = || IntervalParseError {
            input: s.to_string(),
        };

        let mut minutes: u64 = 0;
        let mut seconds: u64 = 0;
        let mut current_num = String::new();
        let mut found_any = false;

        for ch in input.chars() {
            match ch {
                '0'..='9' => current_num.push(ch),
                'm' if !current_num.is_empty() => {
                    minutes = current_num.parse().map_err(|_| invalid())?;
                    current_num.clear();
                    found_any = true;
                }
                's' if !current_num.is_empty() => {
                    seconds = current_num.parse().map_err(|_| invalid())?;
                    current_num.clear();
                    found_any = true;
                }
                _ => return Err(invalid()),
            }
        }

        if !current_num.is_empty() || !found_any {
            return Err(invalid());
        }

        let total_ms = minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(seconds))
            .and_then(|secs| secs.checked_mul(1000))
            .ok_or_else(invalid)?;

        if total_ms == 0 {
            return Err(invalid());
        }

        Ok(Self {
            milliseconds: total_ms,
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if minutes == 0 {
            write!(f, "{}s", seconds)
        } else if seconds == 0 {
            write!(f, "{}m", minutes)
        } else {
            write!(f, "{}m{}s", minutes, seconds)
        }
    }
}
