//! Daily AI usage gate
//!
//! The data store is the single source of truth for quotas. This use case
//! asks it whether an action is allowed and records the action in the same
//! atomic call. A "locally exhausted" hint is remembered after a denial so
//! the client can warn before the next round-trip. The hint survives restarts
//! when a hint store is attached, and it is never consulted when deciding to
//! allow anything.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::usage::{QuotaHints, UsageKind, UsageSnapshot, ALL_USAGE_KINDS};

use super::ports::{Clock, QuotaHintStore, StoreError, SystemClock, UsageStore};

/// Errors from the usage gate
#[derive(Debug, Clone, Error)]
pub enum UsageError {
    #[error("Daily limit reached for {}. Upgrade your plan for unlimited use.", .kind.label())]
    QuotaExceeded { kind: UsageKind },

    #[error("Your session has expired. Please sign in again.")]
    AuthRequired,

    #[error("Could not verify AI usage: {0}. Please try again.")]
    Unavailable(StoreError),
}

impl From<StoreError> for UsageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthorized => Self::AuthRequired,
            other => Self::Unavailable(other),
        }
    }
}

/// Gate for metered AI actions
pub struct UsageLimiter<S>
where
    S: UsageStore,
{
    store: S,
    clock: Arc<dyn Clock>,
    hint_store: Option<Arc<dyn QuotaHintStore>>,
    // None until first loaded from the hint store.
    hints: Mutex<Option<QuotaHints>>,
}

impl<S> UsageLimiter<S>
where
    S: UsageStore,
{
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            hint_store: None,
            hints: Mutex::new(None),
        }
    }

    /// Keep hints in `hint_store` so they outlive this process.
    pub fn with_hint_store(mut self, hint_store: Arc<dyn QuotaHintStore>) -> Self {
        self.hint_store = Some(hint_store);
        self
    }

    /// Current UTC day as seen by this gate
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Fetch the server view of today's usage.
    /// Kinds the server reports as available clear their local hint.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, user_id: &str) -> Result<UsageSnapshot, UsageError> {
        let snapshot = self.store.usage(user_id, self.today()).await?;

        self.update_hints(|hints| {
            for kind in ALL_USAGE_KINDS {
                if snapshot.can_use(*kind) {
                    hints.clear(user_id, *kind);
                }
            }
        })
        .await;

        Ok(snapshot)
    }

    /// May `user_id` perform `kind` today? Errors read as "no".
    pub async fn can_use(&self, user_id: &str, kind: UsageKind) -> bool {
        match self.snapshot(user_id).await {
            Ok(snapshot) => snapshot.can_use(kind),
            Err(e) => {
                warn!(user_id, %kind, error = %e, "usage check failed, denying");
                false
            }
        }
    }

    /// Record one `kind` action if the server allows it.
    ///
    /// Always asks the server, whatever the local hint says. A store error
    /// denies the action (fail closed).
    #[instrument(skip(self))]
    pub async fn try_consume(&self, user_id: &str, kind: UsageKind) -> Result<(), UsageError> {
        let today = self.today();

        match self.store.increment_and_check(user_id, kind, today).await {
            Ok(true) => {
                debug!("usage recorded");
                self.update_hints(|hints| hints.clear(user_id, kind)).await;
                Ok(())
            }
            Ok(false) => {
                info!("daily limit reached");
                self.update_hints(|hints| hints.mark(user_id, kind, today))
                    .await;
                Err(UsageError::QuotaExceeded { kind })
            }
            Err(e) => {
                warn!(error = %e, "usage increment failed, denying");
                Err(e.into())
            }
        }
    }

    /// Boolean form of [`try_consume`](Self::try_consume)
    pub async fn increment_and_check(&self, user_id: &str, kind: UsageKind) -> bool {
        self.try_consume(user_id, kind).await.is_ok()
    }

    /// Whether a denial for `kind` was seen today and not yet contradicted
    /// by the server. For display only.
    pub async fn appears_exhausted(&self, user_id: &str, kind: UsageKind) -> bool {
        let today = self.today();
        self.update_hints(|hints| hints.is_marked(user_id, kind, today))
            .await
    }

    /// Drop all hints, e.g. after the user's plan was upgraded or on sign-out
    pub async fn clear_local_hints(&self) {
        self.update_hints(QuotaHints::clear_all).await;
    }

    /// Apply `f` to the loaded hints and write them back if it changed them.
    /// Hint storage failures are logged and otherwise ignored.
    async fn update_hints<R>(&self, f: impl FnOnce(&mut QuotaHints) -> R) -> R {
        let mut slot = self.hints.lock().await;
        if slot.is_none() {
            *slot = Some(self.load_hints().await);
        }
        let hints = slot.get_or_insert_with(QuotaHints::default);

        let before = hints.clone();
        let out = f(&mut *hints);

        if *hints != before {
            if let Some(hint_store) = &self.hint_store {
                if let Err(e) = hint_store.save(hints).await {
                    warn!(error = %e, "could not save quota hints");
                }
            }
        }

        out
    }

    async fn load_hints(&self) -> QuotaHints {
        let Some(hint_store) = &self.hint_store else {
            return QuotaHints::default();
        };

        match hint_store.load().await {
            Ok(mut hints) => {
                hints.prune(self.today());
                hints
            }
            Err(e) => {
                warn!(error = %e, "could not load quota hints, starting empty");
                QuotaHints::default()
            }
        }
    }
}
