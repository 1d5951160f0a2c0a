//! Server view of a user's daily usage

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{UsageCounter, UsageKind, ALL_USAGE_KINDS, FREE_DAILY_LIMIT};

/// Remaining allowance for one usage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Unlimited,
    Remaining(u32),
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Remaining(n) => write!(f, "{}", n),
        }
    }
}

/// Usage for the current day together with the entitlement bypass flag.
/// The counter is always normalised to the day the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub counter: UsageCounter,
    pub has_subscription: bool,
}

impl UsageSnapshot {
    pub fn can_use(&self, kind: UsageKind) -> bool {
        self.counter
            .is_available(kind, self.counter.day, self.has_subscription)
    }

    pub fn used(&self, kind: UsageKind) -> u32 {
        self.counter.count(kind)
    }

    pub fn remaining(&self, kind: UsageKind) -> Quota {
        if self.has_subscription {
            Quota::Unlimited
        } else {
            Quota::Remaining(FREE_DAILY_LIMIT.saturating_sub(self.used(kind)))
        }
    }

    /// Share of the combined free allowance used today (0 for subscribers)
    pub fn usage_percentage(&self) -> f64 {
        if self.has_subscription {
            return 0.0;
        }
        let used: u32 = ALL_USAGE_KINDS
            .iter()
            .map(|kind| self.used(*kind).min(FREE_DAILY_LIMIT))
            .sum();
        let total = FREE_DAILY_LIMIT * ALL_USAGE_KINDS.len() as u32;
        f64::from(used) / f64::from(total) * 100.0
    }
}
