//! Stripe REST API payment provider adapter

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::{
    Customer, PaymentError, PaymentProvider, ProviderPayment, ProviderSubscription,
};

/// Stripe API base URL
const API_BASE_URL: &str = "https://api.stripe.com";

/// Page size for subscription and payment listings
const LIST_LIMIT: &str = "10";

// Response types for the Stripe API

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubscriptionObject {
    id: String,
    customer: String,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<List<SubscriptionItem>>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Option<Price>,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

impl SubscriptionObject {
    fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.as_ref().and_then(|items| items.data.first())
    }

    /// Newer API versions moved the billing period onto the items.
    pub(super) fn into_subscription(self) -> ProviderSubscription {
        let item = self.first_item();
        let price_id = item.and_then(|i| i.price.as_ref()).map(|p| p.id.clone());
        let start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start));
        let end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end));

        ProviderSubscription {
            id: self.id,
            customer_id: self.customer,
            status: self.status,
            price_id,
            current_period_start: timestamp(start),
            current_period_end: timestamp(end),
            metadata: self.metadata,
        }
    }
}

/// Stripe client authenticated with a secret key
pub struct StripeClient {
    secret_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(secret_key, API_BASE_URL)
    }

    /// Point the client at another host (stripe-mock, tests)
    pub fn with_base_url(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PaymentError> {
        debug!(path, "stripe request");

        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(PaymentError::Unauthorized);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::RateLimited);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(PaymentError::ApiError(format!("HTTP {}: {}", status, message)));
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn list_customers_by_email(&self, email: &str) -> Result<Vec<Customer>, PaymentError> {
        let list: List<CustomerObject> = self
            .get("customers", &[("email", email), ("limit", "1")])
            .await?;

        Ok(list
            .data
            .into_iter()
            .map(|c| Customer {
                id: c.id,
                email: c.email,
            })
            .collect())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, PaymentError> {
        let list: List<SubscriptionObject> = self
            .get(
                "subscriptions",
                &[
                    ("customer", customer_id),
                    ("status", "all"),
                    ("limit", LIST_LIMIT),
                ],
            )
            .await?;

        Ok(list
            .data
            .into_iter()
            .map(SubscriptionObject::into_subscription)
            .collect())
    }

    async fn list_payments(&self, customer_id: &str) -> Result<Vec<ProviderPayment>, PaymentError> {
        let list: List<PaymentIntentObject> = self
            .get(
                "payment_intents",
                &[("customer", customer_id), ("limit", LIST_LIMIT)],
            )
            .await?;

        Ok(list
            .data
            .into_iter()
            .map(|p| ProviderPayment {
                id: p.id,
                status: p.status,
                metadata: p.metadata,
            })
            .collect())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, PaymentError> {
        let path = format!("subscriptions/{}", subscription_id);
        let sub: SubscriptionObject = self.get(&path, &[]).await?;
        Ok(sub.into_subscription())
    }
}
