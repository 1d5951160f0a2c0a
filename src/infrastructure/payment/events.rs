//! Stripe webhook event decoding
//!
//! The payload is trusted as-is; signature verification happens in the
//! HTTP layer that receives the webhook.

use std::collections::HashMap;

use serde::Deserialize;

use super::stripe::SubscriptionObject;
use crate::application::ports::{CheckoutMode, CheckoutSession, PaymentError, PaymentEvent};

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    mode: String,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    subscription: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: &str,
    object: serde_json::Value,
) -> Result<T, PaymentError> {
    serde_json::from_value(object)
        .map_err(|e| PaymentError::ParseError(format!("{} payload: {}", kind, e)))
}

fn checkout_mode(mode: &str) -> Result<CheckoutMode, PaymentError> {
    match mode {
        "subscription" => Ok(CheckoutMode::Subscription),
        "payment" => Ok(CheckoutMode::Payment),
        "setup" => Ok(CheckoutMode::Setup),
        other => Err(PaymentError::ParseError(format!(
            "unknown checkout mode: {}",
            other
        ))),
    }
}

/// Decode a raw webhook body into a [`PaymentEvent`].
/// Event types we do not act on come back as `Unhandled`.
pub fn parse_event(payload: &str) -> Result<PaymentEvent, PaymentError> {
    let event: Event =
        serde_json::from_str(payload).map_err(|e| PaymentError::ParseError(e.to_string()))?;
    let kind = event.kind.as_str();
    let object = event.data.object;

    let parsed = match kind {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = decode(kind, object)?;
            PaymentEvent::CheckoutCompleted(CheckoutSession {
                id: session.id,
                mode: checkout_mode(&session.mode)?,
                customer_id: session.customer,
                subscription_id: session.subscription,
                metadata: session.metadata.unwrap_or_default(),
            })
        }
        "customer.subscription.updated" => {
            let sub: SubscriptionObject = decode(kind, object)?;
            PaymentEvent::SubscriptionUpdated(sub.into_subscription())
        }
        "customer.subscription.deleted" => {
            let sub: SubscriptionObject = decode(kind, object)?;
            PaymentEvent::SubscriptionDeleted(sub.into_subscription())
        }
        "invoice.payment_succeeded" => {
            let invoice: InvoiceObject = decode(kind, object)?;
            PaymentEvent::InvoicePaid {
                subscription_id: invoice.subscription,
            }
        }
        "invoice.payment_failed" => {
            let invoice: InvoiceObject = decode(kind, object)?;
            PaymentEvent::InvoiceFailed {
                subscription_id: invoice.subscription,
            }
        }
        other => PaymentEvent::Unhandled(other.to_string()),
    };

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(kind: &str, object: serde_json::Value) -> String {
        json!({
            "id": "evt_1",
            "object": "event",
            "type": kind,
            "data": { "object": object }
        })
        .to_string()
    }

    #[test]
    fn checkout_session_carries_mode_and_metadata() {
        let payload = envelope(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "user_id": "user-1", "price_id": "price_m" }
            }),
        );

        match parse_event(&payload).unwrap() {
            PaymentEvent::CheckoutCompleted(session) => {
                assert_eq!(session.mode, CheckoutMode::Subscription);
                assert_eq!(session.subscription_id.as_deref(), Some("sub_1"));
                assert_eq!(session.user_id(), Some("user-1"));
                assert_eq!(session.price_id().as_deref(), Some("price_m"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn checkout_session_with_null_metadata() {
        let payload = envelope(
            "checkout.session.completed",
            json!({ "id": "cs_2", "mode": "payment", "customer": null, "metadata": null }),
        );

        match parse_event(&payload).unwrap() {
            PaymentEvent::CheckoutCompleted(session) => {
                assert_eq!(session.mode, CheckoutMode::Payment);
                assert!(session.customer_id.is_none());
                assert!(session.user_id().is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn subscription_events_decode_the_subscription() {
        let object = json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "canceled",
            "current_period_start": 1_767_225_600,
            "current_period_end": 1_769_904_000,
            "metadata": { "user_id": "user-1" }
        });

        match parse_event(&envelope("customer.subscription.deleted", object.clone())).unwrap() {
            PaymentEvent::SubscriptionDeleted(sub) => {
                assert_eq!(sub.id, "sub_1");
                assert_eq!(sub.status, "canceled");
                assert!(!sub.grants_access());
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(matches!(
            parse_event(&envelope("customer.subscription.updated", object)).unwrap(),
            PaymentEvent::SubscriptionUpdated(_)
        ));
    }

    #[test]
    fn invoice_events_keep_subscription_id() {
        let paid = envelope(
            "invoice.payment_succeeded",
            json!({ "id": "in_1", "subscription": "sub_1" }),
        );
        assert_eq!(
            parse_event(&paid).unwrap(),
            PaymentEvent::InvoicePaid {
                subscription_id: Some("sub_1".to_string())
            }
        );

        let failed = envelope("invoice.payment_failed", json!({ "id": "in_2" }));
        assert_eq!(
            parse_event(&failed).unwrap(),
            PaymentEvent::InvoiceFailed {
                subscription_id: None
            }
        );
    }

    #[test]
    fn other_event_types_are_unhandled() {
        let payload = envelope("customer.created", json!({ "id": "cus_1" }));
        assert_eq!(
            parse_event(&payload).unwrap(),
            PaymentEvent::Unhandled("customer.created".to_string())
        );
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        assert!(matches!(
            parse_event("{not json"),
            Err(PaymentError::ParseError(_))
        ));

        let payload = envelope(
            "customer.subscription.updated",
            json!({ "id": "sub_1" }),
        );
        assert!(matches!(
            parse_event(&payload),
            Err(PaymentError::ParseError(_))
        ));
    }
}
