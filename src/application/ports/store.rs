//! Data store port interfaces

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::entitlement::{Entitlement, EntitlementPatch};
use crate::domain::usage::{UsageKind, UsageSnapshot};

/// Data store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Not authorized to access the data store")]
    Unauthorized,

    #[error("Data store request failed: {0}")]
    RequestFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Failed to parse data store response: {0}")]
    ParseError(String),
}

/// Port for the server-of-record usage counters
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Today's usage for `user_id`, with stale counters read as zero.
    async fn usage(&self, user_id: &str, today: NaiveDate) -> Result<UsageSnapshot, StoreError>;

    /// Atomically roll over, check and increment one `kind` counter.
    ///
    /// Returns false, without mutating the counter, when a user without
    /// active entitlement is already at the daily limit. Concurrent calls for
    /// the same user must never push the count past the limit.
    async fn increment_and_check(
        &self,
        user_id: &str,
        kind: UsageKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError>;
}

/// Port for the mirrored entitlement record
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError>;

    /// Insert or replace the record keyed by `entitlement.user_id`.
    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError>;

    /// Apply a status/period change to the record holding `subscription_id`.
    /// Returns false when no record references that subscription.
    async fn update_by_subscription(
        &self,
        subscription_id: &str,
        patch: &EntitlementPatch,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: UsageStore + ?Sized> UsageStore for Arc<T> {
    async fn usage(&self, user_id: &str, today: NaiveDate) -> Result<UsageSnapshot, StoreError> {
        self.as_ref().usage(user_id, today).await
    }

    async fn increment_and_check(
        &self,
        user_id: &str,
        kind: UsageKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.as_ref().increment_and_check(user_id, kind, today).await
    }
}

#[async_trait]
impl<T: EntitlementStore + ?Sized> EntitlementStore for Arc<T> {
    async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        self.as_ref().entitlement(user_id).await
    }

    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        self.as_ref().upsert(entitlement).await
    }

    async fn update_by_subscription(
        &self,
        subscription_id: &str,
        patch: &EntitlementPatch,
    ) -> Result<bool, StoreError> {
        self.as_ref()
            .update_by_subscription(subscription_id, patch)
            .await
    }
}
