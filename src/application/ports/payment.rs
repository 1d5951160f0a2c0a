//! Payment provider port interface

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entitlement::{Entitlement, EntitlementPatch, EntitlementStatus};

/// Metadata key carrying our user id on provider objects
pub const USER_ID_METADATA_KEY: &str = "user_id";

/// Payment provider errors
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Invalid payment provider API key")]
    Unauthorized,

    #[error("Payment provider rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Payment provider object not found: {0}")]
    NotFound(String),

    #[error("Payment provider request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse payment provider response: {0}")]
    ParseError(String),

    #[error("Payment provider error: {0}")]
    ApiError(String),
}

/// Customer record at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}

/// Recurring subscription at the provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    /// Raw provider status (`active`, `trialing`, `past_due`, `incomplete`, ...)
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    pub fn status(&self) -> EntitlementStatus {
        EntitlementStatus::from_provider(&self.status)
    }

    pub fn grants_access(&self) -> bool {
        self.status().grants_access()
    }

    /// Our user id, when checkout stamped it on the subscription
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn to_entitlement(&self, user_id: &str, customer_id: &str) -> Entitlement {
        Entitlement {
            user_id: user_id.to_string(),
            status: self.status(),
            external_customer_id: customer_id.to_string(),
            external_subscription_id: Some(self.id.clone()),
            external_price_id: self.price_id.clone(),
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
        }
    }

    pub fn to_patch(&self) -> EntitlementPatch {
        EntitlementPatch {
            status: self.status(),
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
        }
    }
}

/// One-time payment at the provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderPayment {
    pub id: String,
    pub status: String,
    pub metadata: HashMap<String, String>,
}

impl ProviderPayment {
    /// Completed payment marked as a lifetime purchase
    pub fn is_lifetime_purchase(&self) -> bool {
        self.status == "succeeded"
            && self.metadata.get("type").map(String::as_str) == Some("lifetime")
    }

    pub fn price_id(&self) -> Option<String> {
        self.metadata.get("price_id").cloned()
    }
}

/// Checkout session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Payment,
    Setup,
}

/// Completed checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: CheckoutMode,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn price_id(&self) -> Option<String> {
        self.metadata.get("price_id").cloned()
    }
}

/// Provider event pushed to us, reduced to what entitlements care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutSession),
    SubscriptionUpdated(ProviderSubscription),
    SubscriptionDeleted(ProviderSubscription),
    InvoicePaid { subscription_id: Option<String> },
    InvoiceFailed { subscription_id: Option<String> },
    /// Any other event type, by name
    Unhandled(String),
}

/// Port for the payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Customers registered with `email` (at most one is looked at).
    async fn list_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, PaymentError>;

    /// All of a customer's subscriptions, regardless of status.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, PaymentError>;

    /// A customer's recent one-time payments.
    async fn list_payments(&self, customer_id: &str) -> Result<Vec<ProviderPayment>, PaymentError>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, PaymentError>;
}

#[async_trait]
impl<T: PaymentProvider + ?Sized> PaymentProvider for Arc<T> {
    async fn list_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, PaymentError> {
        self.as_ref().list_customers_by_email(email).await
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, PaymentError> {
        self.as_ref().list_subscriptions(customer_id).await
    }

    async fn list_payments(&self, customer_id: &str) -> Result<Vec<ProviderPayment>, PaymentError> {
        self.as_ref().list_payments(customer_id).await
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, PaymentError> {
        self.as_ref().retrieve_subscription(subscription_id).await
    }
}
