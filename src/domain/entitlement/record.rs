//! Entitlement entity

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::EntitlementStatus;

/// A user's access level, mirrored from the payment provider.
/// One record per user, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub user_id: String,
    pub status: EntitlementStatus,
    pub external_customer_id: String,
    pub external_subscription_id: Option<String>,
    pub external_price_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn has_active_access(&self) -> bool {
        self.status.grants_access()
    }

    /// The paid period has ended and the provider has not renewed it.
    /// Records without a period end never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.current_period_end {
            Some(end) => end < now && !self.has_active_access(),
            None => false,
        }
    }

    /// Entitlement for a completed one-time lifetime purchase
    pub fn lifetime(
        user_id: impl Into<String>,
        customer_id: impl Into<String>,
        price_id: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            status: EntitlementStatus::Active,
            external_customer_id: customer_id.into(),
            external_subscription_id: None,
            external_price_id: price_id,
            current_period_start: None,
            current_period_end: Some(lifetime_period_end()),
        }
    }

    /// Apply a provider-side status/period change
    pub fn apply(&mut self, patch: &EntitlementPatch) {
        self.status = patch.status;
        if patch.current_period_start.is_some() {
            self.current_period_start = patch.current_period_start;
        }
        if patch.current_period_end.is_some() {
            self.current_period_end = patch.current_period_end;
        }
    }
}

/// Partial update addressed by external subscription id (webhook path)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub status: EntitlementStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl EntitlementPatch {
    pub fn status_only(status: EntitlementStatus) -> Self {
        Self {
            status,
            current_period_start: None,
            current_period_end: None,
        }
    }
}

/// Period end recorded for lifetime purchases
pub fn lifetime_period_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entitlement(status: EntitlementStatus, end: Option<DateTime<Utc>>) -> Entitlement {
        Entitlement {
            user_id: "user-1".to_string(),
            status,
            external_customer_id: "cus_1".to_string(),
            external_subscription_id: Some("sub_1".to_string()),
            external_price_id: None,
            current_period_start: None,
            current_period_end: end,
        }
    }

    #[test]
    fn active_with_future_end_is_not_expired() {
        let now = Utc::now();
        let e = entitlement(EntitlementStatus::Active, Some(now + Duration::days(1)));
        assert!(e.has_active_access());
        assert!(!e.is_expired(now));
    }

    #[test]
    fn active_with_past_end_is_not_expired() {
        let now = Utc::now();
        let e = entitlement(EntitlementStatus::Active, Some(now - Duration::days(1)));
        assert!(!e.is_expired(now));
    }

    #[test]
    fn canceled_with_past_end_is_expired() {
        let now = Utc::now();
        let e = entitlement(EntitlementStatus::Canceled, Some(now - Duration::hours(1)));
        assert!(!e.has_active_access());
        assert!(e.is_expired(now));
    }

    #[test]
    fn missing_period_end_never_expires() {
        let e = entitlement(EntitlementStatus::Inactive, None);
        assert!(!e.is_expired(Utc::now()));
    }

    #[test]
    fn lifetime_is_active_until_2099() {
        let e = Entitlement::lifetime("user-1", "cus_1", Some("price_life".to_string()));
        assert!(e.has_active_access());
        assert_eq!(e.current_period_end, Some(lifetime_period_end()));
        assert!(e.external_subscription_id.is_none());
        assert_eq!(lifetime_period_end().to_rfc3339(), "2099-12-31T00:00:00+00:00");
    }

    #[test]
    fn apply_patch_keeps_unset_periods() {
        let end = Utc::now();
        let mut e = entitlement(EntitlementStatus::Active, Some(end));
        e.apply(&EntitlementPatch::status_only(EntitlementStatus::PastDue));
        assert_eq!(e.status, EntitlementStatus::PastDue);
        assert_eq!(e.current_period_end, Some(end));
    }
}
