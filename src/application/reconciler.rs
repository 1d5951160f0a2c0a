//! Subscription reconciliation use case
//!
//! Pulls the signed-in user's subscription state from the payment provider
//! and mirrors it into the entitlement store. The provider wins; nothing is
//! written when the provider has nothing to report or when any call fails.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::auth::Session;
use crate::domain::entitlement::Entitlement;
use crate::domain::schedule::Interval;

use super::ports::{
    AuthError, AuthProvider, Clock, EntitlementStore, PaymentError, PaymentProvider, StoreError,
    SystemClock,
};

/// Errors from a sync attempt. None of them leave a partial write behind.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("{0}")]
    AuthRequired(#[from] AuthError),

    #[error("Subscription sync timed out after {0}")]
    Timeout(Interval),

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Where an entitlement was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementSource {
    Subscription,
    LifetimePayment,
}

/// Result of a completed sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The provider reported an entitlement and it was mirrored locally
    Synced {
        entitlement: Entitlement,
        source: EntitlementSource,
    },
    /// No provider customer is registered with the user's email
    NoCustomer { email: String },
    /// The customer exists but has neither a live subscription nor a
    /// lifetime purchase. The local record is left as it was.
    NoEntitlement {
        customer_id: String,
        subscriptions: usize,
        payments: usize,
    },
}

impl SyncOutcome {
    pub fn entitlement(&self) -> Option<&Entitlement> {
        match self {
            Self::Synced { entitlement, .. } => Some(entitlement),
            _ => None,
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match self {
            Self::Synced {
                entitlement,
                source: EntitlementSource::Subscription,
            } => format!("Subscription synced: {}", entitlement.status),
            Self::Synced {
                source: EntitlementSource::LifetimePayment,
                ..
            } => "Lifetime purchase synced".to_string(),
            Self::NoCustomer { email } => {
                format!("No payment customer found for {}", email)
            }
            Self::NoEntitlement {
                subscriptions,
                payments,
                ..
            } => format!(
                "No active subscription found ({} subscriptions, {} payments checked)",
                subscriptions, payments
            ),
        }
    }
}

/// Reconciles provider state into the entitlement store
pub struct SubscriptionReconciler<A, P, S>
where
    A: AuthProvider,
    P: PaymentProvider,
    S: EntitlementStore,
{
    auth: A,
    payments: P,
    store: S,
    clock: Arc<dyn Clock>,
    timeout: Interval,
}

impl<A, P, S> SubscriptionReconciler<A, P, S>
where
    A: AuthProvider,
    P: PaymentProvider,
    S: EntitlementStore,
{
    pub fn new(auth: A, payments: P, store: S) -> Self {
        Self {
            auth,
            payments,
            store,
            clock: Arc::new(SystemClock),
            timeout: Interval::default_sync_timeout(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Interval) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Entitlement currently mirrored for the signed-in user.
    /// Bounded by the same timeout as a sync.
    pub async fn cached(&self) -> Result<Option<Entitlement>, SyncError> {
        self.bounded(async {
            let session = self.auth.valid_session(self.clock.now()).await?;
            Ok(self.store.entitlement(&session.user_id).await?)
        })
        .await
    }

    /// Pull provider state for the signed-in user and mirror it.
    ///
    /// Refreshes an expired session first. If the store rejects the token
    /// the session is refreshed once more and the pull retried. The whole
    /// attempt, refreshes included, is bounded by the configured timeout.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.bounded(self.attempt()).await
    }

    async fn attempt(&self) -> Result<SyncOutcome, SyncError> {
        let session = self.auth.valid_session(self.clock.now()).await?;

        match self.pull(&session).await {
            Err(SyncError::Store(StoreError::Unauthorized)) => {
                debug!("store rejected the session, refreshing once");
                let session = self.auth.refresh().await?;
                self.pull(&session).await
            }
            other => other,
        }
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.timeout.as_std(), work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = %self.timeout, "subscription sync timed out");
                Err(SyncError::Timeout(self.timeout))
            }
        }
    }

    async fn pull(&self, session: &Session) -> Result<SyncOutcome, SyncError> {
        let customers = self
            .payments
            .list_customers_by_email(&session.email)
            .await?;

        let Some(customer) = customers.into_iter().next() else {
            info!(email = %session.email, "no payment customer");
            return Ok(SyncOutcome::NoCustomer {
                email: session.email.clone(),
            });
        };

        let subscriptions = self.payments.list_subscriptions(&customer.id).await?;
        if let Some(subscription) = subscriptions.iter().find(|s| s.grants_access()) {
            let entitlement = subscription.to_entitlement(&session.user_id, &customer.id);
            self.store.upsert(&entitlement).await?;
            info!(subscription_id = %subscription.id, status = %entitlement.status, "subscription synced");
            return Ok(SyncOutcome::Synced {
                entitlement,
                source: EntitlementSource::Subscription,
            });
        }

        let payments = self.payments.list_payments(&customer.id).await?;
        if let Some(payment) = payments.iter().find(|p| p.is_lifetime_purchase()) {
            let entitlement =
                Entitlement::lifetime(&session.user_id, &customer.id, payment.price_id());
            self.store.upsert(&entitlement).await?;
            info!(payment_id = %payment.id, "lifetime purchase synced");
            return Ok(SyncOutcome::Synced {
                entitlement,
                source: EntitlementSource::LifetimePayment,
            });
        }

        info!(
            customer_id = %customer.id,
            subscriptions = subscriptions.len(),
            payments = payments.len(),
            "no active entitlement at provider"
        );
        Ok(SyncOutcome::NoEntitlement {
            customer_id: customer.id,
            subscriptions: subscriptions.len(),
            payments: payments.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::ports::{Customer, ProviderPayment, ProviderSubscription};
    use crate::application::usage_limiter::tests::fixed_clock;
    use crate::domain::entitlement::{lifetime_period_end, EntitlementPatch, EntitlementStatus};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    pub(crate) struct MockAuth {
        pub session: Mutex<Option<Session>>,
        pub refresh_fails: AtomicBool,
        pub refresh_hangs: AtomicBool,
        pub refreshes: AtomicUsize,
    }

    impl MockAuth {
        pub(crate) fn signed_in() -> Self {
            Self {
                session: Mutex::new(Some(session(
                    Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap(),
                ))),
                refresh_fails: AtomicBool::new(false),
                refresh_hangs: AtomicBool::new(false),
                refreshes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthProvider for MockAuth {
        async fn session(&self) -> Result<Session, AuthError> {
            self.session.lock().unwrap().clone().ok_or(AuthError::NotSignedIn)
        }

        async fn refresh(&self) -> Result<Session, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_hangs.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
            if self.refresh_fails.load(Ordering::SeqCst) {
                return Err(AuthError::RefreshFailed("invalid refresh token".to_string()));
            }
            let mut guard = self.session.lock().unwrap();
            let mut refreshed = guard.clone().ok_or(AuthError::NotSignedIn)?;
            refreshed.access_token = "refreshed".to_string();
            refreshed.expires_at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
            *guard = Some(refreshed.clone());
            Ok(refreshed)
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct MockPayments {
        pub customers: Vec<Customer>,
        pub subscriptions: Vec<ProviderSubscription>,
        pub payments: Vec<ProviderPayment>,
        pub fail: bool,
        pub delay: Option<std::time::Duration>,
        pub customer_lookups: AtomicUsize,
    }

    impl MockPayments {
        pub(crate) fn with_customer() -> Self {
            Self {
                customers: vec![Customer {
                    id: "cus_1".to_string(),
                    email: Some("ada@example.com".to_string()),
                }],
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPayments {
        async fn list_customers_by_email(&self, _email: &str) -> Result<Vec<Customer>, PaymentError> {
            self.customer_lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(PaymentError::RequestFailed("connection reset".to_string()));
            }
            Ok(self.customers.clone())
        }

        async fn list_subscriptions(
            &self,
            _customer_id: &str,
        ) -> Result<Vec<ProviderSubscription>, PaymentError> {
            Ok(self.subscriptions.clone())
        }

        async fn list_payments(&self, _customer_id: &str) -> Result<Vec<ProviderPayment>, PaymentError> {
            Ok(self.payments.clone())
        }

        async fn retrieve_subscription(
            &self,
            subscription_id: &str,
        ) -> Result<ProviderSubscription, PaymentError> {
            self.subscriptions
                .iter()
                .find(|s| s.id == subscription_id)
                .cloned()
                .ok_or_else(|| PaymentError::NotFound(subscription_id.to_string()))
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryEntitlements {
        pub records: Mutex<HashMap<String, Entitlement>>,
        pub writes: AtomicUsize,
        pub reject_token: AtomicBool,
    }

    #[async_trait]
    impl EntitlementStore for MemoryEntitlements {
        async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
            Ok(self.records.lock().unwrap().get(user_id).cloned())
        }

        async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
            if self.reject_token.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Unauthorized);
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.records
                .lock()
                .unwrap()
                .insert(entitlement.user_id.clone(), entitlement.clone());
            Ok(())
        }

        async fn update_by_subscription(
            &self,
            subscription_id: &str,
            patch: &EntitlementPatch,
        ) -> Result<bool, StoreError> {
            let mut records = self.records.lock().unwrap();
            let found = records
                .values_mut()
                .find(|e| e.external_subscription_id.as_deref() == Some(subscription_id));
            match found {
                Some(record) => {
                    self.writes.fetch_add(1, Ordering::SeqCst);
                    record.apply(patch);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    pub(crate) fn subscription(id: &str, status: &str) -> ProviderSubscription {
        ProviderSubscription {
            id: id.to_string(),
            customer_id: "cus_1".to_string(),
            status: status.to_string(),
            price_id: Some("price_monthly".to_string()),
            current_period_start: Some(Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap()),
            current_period_end: Some(Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()),
            metadata: HashMap::from([("user_id".to_string(), "user-1".to_string())]),
        }
    }

    fn lifetime_payment() -> ProviderPayment {
        ProviderPayment {
            id: "pi_1".to_string(),
            status: "succeeded".to_string(),
            metadata: HashMap::from([
                ("type".to_string(), "lifetime".to_string()),
                ("price_id".to_string(), "price_lifetime".to_string()),
            ]),
        }
    }

    type Reconciler =
        SubscriptionReconciler<Arc<MockAuth>, Arc<MockPayments>, Arc<MemoryEntitlements>>;

    fn reconciler(
        payments: MockPayments,
    ) -> (Reconciler, Arc<MockAuth>, Arc<MemoryEntitlements>) {
        let auth = Arc::new(MockAuth::signed_in());
        let store = Arc::new(MemoryEntitlements::default());
        let reconciler =
            SubscriptionReconciler::new(Arc::clone(&auth), Arc::new(payments), Arc::clone(&store))
                .with_clock(fixed_clock());
        (reconciler, auth, store)
    }

    #[tokio::test]
    async fn mirrors_active_subscription() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![
            subscription("sub_old", "canceled"),
            subscription("sub_live", "active"),
        ];
        let (reconciler, _, store) = reconciler(payments);

        let outcome = reconciler.sync().await.unwrap();

        let entitlement = outcome.entitlement().unwrap();
        assert_eq!(entitlement.status, EntitlementStatus::Active);
        assert_eq!(entitlement.external_subscription_id.as_deref(), Some("sub_live"));
        assert_eq!(entitlement.external_customer_id, "cus_1");
        assert_eq!(
            store.records.lock().unwrap().get("user-1"),
            Some(entitlement)
        );
    }

    #[tokio::test]
    async fn trialing_counts_as_live() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_trial", "trialing")];
        let (reconciler, _, _) = reconciler(payments);

        let outcome = reconciler.sync().await.unwrap();
        assert_eq!(
            outcome.entitlement().map(|e| e.status),
            Some(EntitlementStatus::Trialing)
        );
    }

    #[tokio::test]
    async fn falls_back_to_lifetime_purchase() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_old", "canceled")];
        payments.payments = vec![lifetime_payment()];
        let (reconciler, _, _) = reconciler(payments);

        let outcome = reconciler.sync().await.unwrap();

        match outcome {
            SyncOutcome::Synced {
                entitlement,
                source: EntitlementSource::LifetimePayment,
            } => {
                assert_eq!(entitlement.status, EntitlementStatus::Active);
                assert_eq!(entitlement.external_price_id.as_deref(), Some("price_lifetime"));
                assert_eq!(entitlement.current_period_end, Some(lifetime_period_end()));
                assert!(entitlement.external_subscription_id.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn no_customer_writes_nothing() {
        let (reconciler, _, store) = reconciler(MockPayments::default());

        let outcome = reconciler.sync().await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::NoCustomer {
                email: "ada@example.com".to_string()
            }
        );
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nothing_live_leaves_existing_record_alone() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_1", "canceled")];
        let (reconciler, _, store) = reconciler(payments);
        let existing = subscription("sub_1", "active").to_entitlement("user-1", "cus_1");
        store
            .records
            .lock()
            .unwrap()
            .insert("user-1".to_string(), existing.clone());

        let outcome = reconciler.sync().await.unwrap();

        assert!(matches!(
            outcome,
            SyncOutcome::NoEntitlement {
                subscriptions: 1,
                payments: 0,
                ..
            }
        ));
        assert_eq!(store.records.lock().unwrap().get("user-1"), Some(&existing));
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_live", "active")];
        let (reconciler, _, store) = reconciler(payments);

        reconciler.sync().await.unwrap();
        let first = store.records.lock().unwrap().clone();
        reconciler.sync().await.unwrap();
        let second = store.records.lock().unwrap().clone();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn provider_failure_writes_nothing() {
        let mut payments = MockPayments::with_customer();
        payments.fail = true;
        let (reconciler, _, store) = reconciler(payments);

        let err = reconciler.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::Payment(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_before_pulling() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_live", "active")];
        let (reconciler, auth, _) = reconciler(payments);
        *auth.session.lock().unwrap() = Some(session(
            Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
        ));

        reconciler.sync().await.unwrap();

        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_requires_sign_in() {
        let payments = Arc::new(MockPayments::with_customer());
        let auth = Arc::new(MockAuth::signed_in());
        auth.refresh_fails.store(true, Ordering::SeqCst);
        *auth.session.lock().unwrap() = Some(session(
            Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
        ));
        let reconciler = SubscriptionReconciler::new(
            Arc::clone(&auth),
            Arc::clone(&payments),
            Arc::new(MemoryEntitlements::default()),
        )
        .with_clock(fixed_clock());

        let err = reconciler.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::AuthRequired(AuthError::RefreshFailed(_))));
        assert_eq!(payments.customer_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_live", "active")];
        let (reconciler, auth, store) = reconciler(payments);
        store.reject_token.store(true, Ordering::SeqCst);

        let outcome = reconciler.sync().await.unwrap();

        assert!(outcome.entitlement().is_some());
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let mut payments = MockPayments::with_customer();
        payments.delay = Some(std::time::Duration::from_secs(60));
        let (reconciler, _, store) = reconciler(payments);

        let err = reconciler.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    fn hung_auth_reconciler() -> (Reconciler, Arc<MockAuth>, Arc<MemoryEntitlements>) {
        let mut payments = MockPayments::with_customer();
        payments.subscriptions = vec![subscription("sub_live", "active")];
        let (reconciler, auth, store) = reconciler(payments);
        auth.refresh_hangs.store(true, Ordering::SeqCst);
        (reconciler.with_timeout(Interval::from_secs(10)), auth, store)
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_before_pulling_times_out() {
        let (reconciler, auth, store) = hung_auth_reconciler();
        *auth.session.lock().unwrap() = Some(session(
            Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
        ));

        let started = tokio::time::Instant::now();
        let err = reconciler.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
        assert!(started.elapsed() <= std::time::Duration::from_secs(11));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_on_retry_times_out() {
        let (reconciler, auth, store) = hung_auth_reconciler();
        store.reject_token.store(true, Ordering::SeqCst);

        let started = tokio::time::Instant::now();
        let err = reconciler.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
        assert!(started.elapsed() <= std::time::Duration::from_secs(11));
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_bounds_cached_read() {
        let (reconciler, auth, _) = hung_auth_reconciler();
        *auth.session.lock().unwrap() = Some(session(
            Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
        ));

        let started = tokio::time::Instant::now();
        let err = reconciler.cached().await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
        assert!(started.elapsed() <= std::time::Duration::from_secs(11));
    }

    #[test]
    fn outcome_summary_is_readable() {
        let outcome = SyncOutcome::NoEntitlement {
            customer_id: "cus_1".to_string(),
            subscriptions: 2,
            payments: 1,
        };
        assert!(outcome.summary().contains("2 subscriptions"));
    }
}
