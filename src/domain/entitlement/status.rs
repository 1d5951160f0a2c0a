//! Entitlement status value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidStatusError;

/// Subscription status mirrored from the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    #[default]
    Inactive,
    Canceled,
    PastDue,
    Trialing,
}

impl EntitlementStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Trialing => "trialing",
        }
    }

    /// Only active and trialing subscriptions unlock paid features
    pub const fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Map a raw provider subscription status onto the mirrored set.
    ///
    /// `unpaid` behaves like `past_due`, `incomplete_expired` like
    /// `canceled`; anything else unknown reads as `inactive`.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "unpaid" => Self::PastDue,
            "incomplete_expired" => Self::Canceled,
            other => other.parse().unwrap_or(Self::Inactive),
        }
    }
}

impl FromStr for EntitlementStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            "trialing" => Ok(Self::Trialing),
            _ => Err(InvalidStatusError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_only_for_active_and_trialing() {
        assert!(EntitlementStatus::Active.grants_access());
        assert!(EntitlementStatus::Trialing.grants_access());
        assert!(!EntitlementStatus::PastDue.grants_access());
        assert!(!EntitlementStatus::Canceled.grants_access());
        assert!(!EntitlementStatus::Inactive.grants_access());
    }

    #[test]
    fn provider_statuses_map_onto_mirrored_set() {
        assert_eq!(EntitlementStatus::from_provider("active"), EntitlementStatus::Active);
        assert_eq!(EntitlementStatus::from_provider("past_due"), EntitlementStatus::PastDue);
        assert_eq!(EntitlementStatus::from_provider("unpaid"), EntitlementStatus::PastDue);
        assert_eq!(
            EntitlementStatus::from_provider("incomplete_expired"),
            EntitlementStatus::Canceled
        );
        assert_eq!(EntitlementStatus::from_provider("incomplete"), EntitlementStatus::Inactive);
        assert_eq!(EntitlementStatus::from_provider("paused"), EntitlementStatus::Inactive);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("PAST_DUE".parse::<EntitlementStatus>().unwrap(), EntitlementStatus::PastDue);
        assert_eq!(EntitlementStatus::PastDue.to_string(), "past_due");
        assert!("gold".parse::<EntitlementStatus>().is_err());
    }
}
