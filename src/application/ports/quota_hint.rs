//! Quota hint persistence port interface

use async_trait::async_trait;

use super::store::StoreError;
use crate::domain::usage::QuotaHints;

/// Port for keeping quota denial hints between runs
#[async_trait]
pub trait QuotaHintStore: Send + Sync {
    /// Stored hints, empty when none were saved.
    async fn load(&self) -> Result<QuotaHints, StoreError>;

    async fn save(&self, hints: &QuotaHints) -> Result<(), StoreError>;
}
