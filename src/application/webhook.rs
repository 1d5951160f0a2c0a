//! Payment webhook use case
//!
//! Applies provider-pushed events to the entitlement store. Events that do
//! not carry our user id, or that we do not track, are ignored rather than
//! rejected so the provider stops redelivering them.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::entitlement::{Entitlement, EntitlementPatch, EntitlementStatus};

use super::ports::{
    CheckoutMode, CheckoutSession, EntitlementStore, PaymentError, PaymentEvent, PaymentProvider,
    ProviderSubscription, StoreError,
};

/// Errors from applying a webhook event
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

/// What an event did to the entitlement store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Upserted(Entitlement),
    Updated {
        subscription_id: String,
        status: EntitlementStatus,
        /// False when no local record references the subscription
        found: bool,
    },
    Ignored(String),
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        info!(reason = %reason, "webhook event ignored");
        Self::Ignored(reason)
    }
}

/// Applies provider events to the entitlement store
pub struct WebhookProcessor<P, S>
where
    P: PaymentProvider,
    S: EntitlementStore,
{
    payments: P,
    store: S,
}

impl<P, S> WebhookProcessor<P, S>
where
    P: PaymentProvider,
    S: EntitlementStore,
{
    pub fn new(payments: P, store: S) -> Self {
        Self { payments, store }
    }

    #[instrument(skip_all)]
    pub async fn apply(&self, event: &PaymentEvent) -> Result<WebhookOutcome, WebhookError> {
        match event {
            PaymentEvent::CheckoutCompleted(session) => self.checkout_completed(session).await,
            PaymentEvent::SubscriptionUpdated(sub) | PaymentEvent::SubscriptionDeleted(sub) => {
                self.update_owned(sub, &sub.to_patch()).await
            }
            PaymentEvent::InvoicePaid { subscription_id } => match subscription_id {
                Some(id) => {
                    let sub = self.payments.retrieve_subscription(id).await?;
                    self.update_owned(&sub, &sub.to_patch()).await
                }
                None => Ok(WebhookOutcome::ignored("invoice without subscription")),
            },
            PaymentEvent::InvoiceFailed { subscription_id } => match subscription_id {
                Some(id) => {
                    let sub = self.payments.retrieve_subscription(id).await?;
                    let patch = EntitlementPatch::status_only(EntitlementStatus::PastDue);
                    self.update_owned(&sub, &patch).await
                }
                None => Ok(WebhookOutcome::ignored("invoice without subscription")),
            },
            PaymentEvent::Unhandled(kind) => {
                Ok(WebhookOutcome::ignored(format!("unhandled event type {}", kind)))
            }
        }
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(user_id) = session.user_id() else {
            return Ok(WebhookOutcome::ignored(format!(
                "checkout {} has no user_id metadata",
                session.id
            )));
        };

        let entitlement = match session.mode {
            CheckoutMode::Subscription => {
                let Some(subscription_id) = session.subscription_id.as_deref() else {
                    return Ok(WebhookOutcome::ignored(format!(
                        "checkout {} has no subscription",
                        session.id
                    )));
                };
                let sub = self.payments.retrieve_subscription(subscription_id).await?;
                let customer_id = session
                    .customer_id
                    .clone()
                    .unwrap_or_else(|| sub.customer_id.clone());
                let mut entitlement = sub.to_entitlement(user_id, &customer_id);
                if let Some(price_id) = session.price_id() {
                    entitlement.external_price_id = Some(price_id);
                }
                entitlement
            }
            CheckoutMode::Payment => {
                let Some(customer_id) = session.customer_id.as_deref() else {
                    warn!(checkout_id = %session.id, "lifetime checkout without customer");
                    return Ok(WebhookOutcome::ignored(format!(
                        "checkout {} has no customer",
                        session.id
                    )));
                };
                Entitlement::lifetime(user_id, customer_id, session.price_id())
            }
            CheckoutMode::Setup => {
                return Ok(WebhookOutcome::ignored("setup-mode checkout"));
            }
        };

        self.store.upsert(&entitlement).await?;
        info!(user_id = %entitlement.user_id, status = %entitlement.status, "entitlement upserted");
        Ok(WebhookOutcome::Upserted(entitlement))
    }

    // Subscriptions created outside our checkout carry no user id.
    async fn update_owned(
        &self,
        sub: &ProviderSubscription,
        patch: &EntitlementPatch,
    ) -> Result<WebhookOutcome, WebhookError> {
        if sub.user_id().is_none() {
            return Ok(WebhookOutcome::ignored(format!(
                "subscription {} has no user_id metadata",
                sub.id
            )));
        }

        let subscription_id = sub.id.as_str();
        let found = self
            .store
            .update_by_subscription(subscription_id, patch)
            .await?;
        if found {
            info!(subscription_id, status = %patch.status, "entitlement updated");
        } else {
            warn!(subscription_id, "no entitlement references subscription");
        }
        Ok(WebhookOutcome::Updated {
            subscription_id: subscription_id.to_string(),
            status: patch.status,
            found,
        })
    }
}
