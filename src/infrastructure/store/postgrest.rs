//! Hosted Postgres data store adapter (PostgREST gateway)
//!
//! Counters are mutated only through the stored procedures in
//! `sql/usage_counters.sql`; the server picks the day, so the `today`
//! argument only labels the returned snapshot.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::application::ports::{AuthProvider, EntitlementStore, StoreError, UsageStore};
use crate::domain::entitlement::{Entitlement, EntitlementPatch, EntitlementStatus};
use crate::domain::usage::{UsageCounter, UsageKind, UsageSnapshot};

const SUBSCRIPTIONS_TABLE: &str = "subscriptions";

/// Response of `get_current_ai_usage`
#[derive(Debug, Deserialize)]
struct UsageResponse {
    ai_transcriptions: u32,
    ai_natural_inputs: u32,
    has_subscription: bool,
}

/// Row of the `subscriptions` table
#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionRow {
    user_id: String,
    status: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    stripe_price_id: Option<String>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    #[serde(default, skip_deserializing)]
    updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    fn from_entitlement(e: &Entitlement) -> Self {
        Self {
            user_id: e.user_id.clone(),
            status: e.status.as_str().to_string(),
            stripe_customer_id: Some(e.external_customer_id.clone()),
            stripe_subscription_id: e.external_subscription_id.clone(),
            stripe_price_id: e.external_price_id.clone(),
            current_period_start: e.current_period_start,
            current_period_end: e.current_period_end,
            updated_at: Some(Utc::now()),
        }
    }

    fn into_entitlement(self) -> Entitlement {
        Entitlement {
            user_id: self.user_id,
            // Rows written by older tooling may carry raw provider statuses.
            status: self
                .status
                .parse()
                .unwrap_or_else(|_| EntitlementStatus::from_provider(&self.status)),
            external_customer_id: self.stripe_customer_id.unwrap_or_default(),
            external_subscription_id: self.stripe_subscription_id,
            external_price_id: self.stripe_price_id,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
        }
    }
}

/// Store backed by the hosted backend's REST gateway.
/// Every request carries the caller's bearer token from `A`.
pub struct PostgrestStore<A>
where
    A: AuthProvider,
{
    base_url: String,
    anon_key: String,
    auth: A,
    client: reqwest::Client,
}

impl<A> PostgrestStore<A>
where
    A: AuthProvider,
{
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>, auth: A) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            auth,
            client: reqwest::Client::new(),
        }
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let session = self
            .auth
            .valid_session(Utc::now())
            .await
            .map_err(|_| StoreError::Unauthorized)?;

        let response = request
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))
    }

    async fn rpc<T: DeserializeOwned>(&self, function: &str, user_id: &str) -> Result<T, StoreError> {
        let request = self
            .client
            .post(self.rpc_url(function))
            .json(&json!({ "p_user_id": user_id }));
        Self::json(self.send(request).await?).await
    }
}

fn increment_function(kind: UsageKind) -> &'static str {
    match kind {
        UsageKind::Transcription => "increment_ai_transcription",
        UsageKind::NaturalInput => "increment_ai_natural_input",
    }
}

#[async_trait]
impl<A> UsageStore for PostgrestStore<A>
where
    A: AuthProvider,
{
    async fn usage(&self, user_id: &str, today: NaiveDate) -> Result<UsageSnapshot, StoreError> {
        let usage: UsageResponse = self.rpc("get_current_ai_usage", user_id).await?;
        Ok(UsageSnapshot {
            counter: UsageCounter {
                day: today,
                transcription_count: usage.ai_transcriptions,
                natural_input_count: usage.ai_natural_inputs,
            },
            has_subscription: usage.has_subscription,
        })
    }

    async fn increment_and_check(
        &self,
        user_id: &str,
        kind: UsageKind,
        _today: NaiveDate,
    ) -> Result<bool, StoreError> {
        let allowed: bool = self.rpc(increment_function(kind), user_id).await?;
        debug!(%kind, allowed, "remote usage increment");
        Ok(allowed)
    }
}

#[async_trait]
impl<A> EntitlementStore for PostgrestStore<A>
where
    A: AuthProvider,
{
    async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        let request = self
            .client
            .get(self.table_url(SUBSCRIPTIONS_TABLE))
            .query(&[("user_id", format!("eq.{}", user_id)), ("select", "*".to_string())]);

        let rows: Vec<SubscriptionRow> = Self::json(self.send(request).await?).await?;
        Ok(rows.into_iter().next().map(SubscriptionRow::into_entitlement))
    }

    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.table_url(SUBSCRIPTIONS_TABLE))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&SubscriptionRow::from_entitlement(entitlement));

        self.send(request).await?;
        Ok(())
    }

    async fn update_by_subscription(
        &self,
        subscription_id: &str,
        patch: &EntitlementPatch,
    ) -> Result<bool, StoreError> {
        let mut body = json!({
            "status": patch.status.as_str(),
            "updated_at": Utc::now(),
        });
        if let Some(start) = patch.current_period_start {
            body["current_period_start"] = json!(start);
        }
        if let Some(end) = patch.current_period_end {
            body["current_period_end"] = json!(end);
        }

        let request = self
            .client
            .patch(self.table_url(SUBSCRIPTIONS_TABLE))
            .query(&[("stripe_subscription_id", format!("eq.{}", subscription_id))])
            .header("Prefer", "return=representation")
            .json(&body);

        let rows: Vec<serde_json::Value> = Self::json(self.send(request).await?).await?;
        Ok(!rows.is_empty())
    }
}
