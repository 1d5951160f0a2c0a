//! Background subscription sync
//!
//! Triggers the reconciler on sign-in, when a cached entitlement is seen to
//! have expired, and on a fixed interval while the user has no active
//! access. Background syncs are fire-and-forget: a failure is logged and the
//! next trigger tries again.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::entitlement::Entitlement;
use crate::domain::schedule::Interval;

use super::ports::{AuthProvider, EntitlementStore, PaymentProvider};
use super::reconciler::SubscriptionReconciler;

/// What caused a background sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    SignIn,
    Expired,
    Periodic,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign-in",
            Self::Expired => "expired",
            Self::Periodic => "periodic",
        }
    }
}

/// Owns the periodic sync task for one signed-in session
pub struct SyncScheduler<A, P, S>
where
    A: AuthProvider + 'static,
    P: PaymentProvider + 'static,
    S: EntitlementStore + 'static,
{
    reconciler: Arc<SubscriptionReconciler<A, P, S>>,
    interval: Interval,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl<A, P, S> SyncScheduler<A, P, S>
where
    A: AuthProvider + 'static,
    P: PaymentProvider + 'static,
    S: EntitlementStore + 'static,
{
    pub fn new(reconciler: Arc<SubscriptionReconciler<A, P, S>>, interval: Interval) -> Self {
        Self {
            reconciler,
            interval,
            shutdown: None,
            handle: None,
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run one sync in the background
    pub fn trigger(&self, trigger: SyncTrigger) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        tokio::spawn(async move { run_sync(&reconciler, trigger).await })
    }

    /// Fire-and-forget sync after a successful sign-in
    pub fn on_sign_in(&self) -> JoinHandle<()> {
        self.trigger(SyncTrigger::SignIn)
    }

    /// Inspect a freshly loaded entitlement and sync if it has expired
    pub fn observe(&self, entitlement: Option<&Entitlement>) -> Option<JoinHandle<()>> {
        let now = self.reconciler.clock().now();
        match entitlement {
            Some(e) if e.is_expired(now) => {
                debug!(user_id = %e.user_id, "cached entitlement expired");
                Some(self.trigger(SyncTrigger::Expired))
            }
            _ => None,
        }
    }

    /// Start the periodic loop. Calling it again while running is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let reconciler = Arc::clone(&self.reconciler);
        let period = self.interval.as_std();

        info!(interval = %self.interval, "starting periodic subscription sync");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; sign-in already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = rx.changed() => break,
                }

                tokio::select! {
                    _ = periodic_tick(&reconciler) => {}
                    _ = rx.changed() => break,
                }
            }
            debug!("periodic subscription sync stopped");
        });

        self.shutdown = Some(tx);
        self.handle = Some(handle);
    }

    /// Stop the periodic loop and wait for it to exit
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync task ended abnormally");
            }
        }
    }
}

impl<A, P, S> Drop for SyncScheduler<A, P, S>
where
    A: AuthProvider + 'static,
    P: PaymentProvider + 'static,
    S: EntitlementStore + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn periodic_tick<A, P, S>(reconciler: &SubscriptionReconciler<A, P, S>)
where
    A: AuthProvider,
    P: PaymentProvider,
    S: EntitlementStore,
{
    match reconciler.cached().await {
        Ok(Some(entitlement)) if entitlement.has_active_access() => {
            debug!("entitlement active, skipping periodic sync");
        }
        Ok(_) => run_sync(reconciler, SyncTrigger::Periodic).await,
        Err(e) => warn!(error = %e, "could not read cached entitlement"),
    }
}

async fn run_sync<A, P, S>(reconciler: &SubscriptionReconciler<A, P, S>, trigger: SyncTrigger)
where
    A: AuthProvider,
    P: PaymentProvider,
    S: EntitlementStore,
{
    match reconciler.sync().await {
        Ok(outcome) => info!(trigger = trigger.as_str(), "{}", outcome.summary()),
        Err(e) => warn!(trigger = trigger.as_str(), error = %e, "subscription sync failed"),
    }
}
