//! Dummy payment provider implementation
//!
//! Checkouts complete immediately without charging anyone: the "hosted checkout" is the
//! success URL itself, and the checkout id encodes the user and product so it can be confirmed
//! synchronously. Useful for local development and tests.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::models::users::CurrentUser,
    config::{DummyConfig, ProductTier},
    payment_providers::{CHECKOUT_ID_PLACEHOLDER, PaidOrder, PaymentError, PaymentProvider, Result, parse_order_event},
    webhooks::verify_webhook,
};

const SESSION_PREFIX: &str = "dummy";

/// Dummy payment provider that fulfills every checkout
pub struct DummyProvider {
    webhook_secret: Option<String>,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self {
            webhook_secret: config.webhook_secret,
        }
    }
}

/// `dummy.{user_id}.{product_id}.{nonce}`
fn session_id(user_id: Uuid, product_id: &str) -> String {
    format!("{SESSION_PREFIX}.{user_id}.{product_id}.{}", Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn create_checkout_session(&self, user: &CurrentUser, product: &ProductTier, success_url: &str) -> Result<String> {
        let session_id = session_id(user.id, &product.product_id);

        tracing::info!("Dummy provider created checkout session {} for user {}", session_id, user.id);

        // The payment is instantly "complete": send the user straight to the success page
        Ok(success_url.replace(CHECKOUT_ID_PLACEHOLDER, &session_id))
    }

    async fn create_billing_portal_session(&self, _user: &CurrentUser, return_url: &str) -> Result<String> {
        Ok(return_url.to_string())
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<PaidOrder>> {
        let Some(secret) = &self.webhook_secret else {
            tracing::warn!("Dummy webhook rejected: no webhook secret configured");
            return Err(PaymentError::UnverifiedEvent);
        };
        verify_webhook(headers, body, secret, Utc::now().timestamp()).map_err(|e| {
            tracing::warn!("Dummy webhook rejected: {e}");
            PaymentError::UnverifiedEvent
        })?;
        parse_order_event(body)
    }

    async fn get_paid_order(&self, checkout_id: &str) -> Result<Option<PaidOrder>> {
        let invalid = || PaymentError::InvalidData("Invalid dummy session ID format".to_string());

        let mut parts = checkout_id.splitn(4, '.');
        let (Some(SESSION_PREFIX), Some(user_id), Some(product_id), Some(nonce)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if nonce.is_empty() || product_id.is_empty() {
            return Err(invalid());
        }

        Ok(Some(PaidOrder {
            order_id: checkout_id.to_string(),
            customer_id: Some(user_id.to_string()),
            product_id: Some(product_id.to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::sign_payload;
    use axum::http::HeaderValue;

    fn user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_checkout_then_confirm() {
        let provider = DummyProvider::from(DummyConfig::default());
        let user = user();
        let product = ProductTier::new("small", "5af2909c-3272-4bc2-bae8-a7e91958d37f", 70);

        let url = provider
            .create_checkout_session(&user, &product, "http://localhost:3000/dashboard?checkout_id={CHECKOUT_ID}")
            .await
            .unwrap();
        let checkout_id = url.split("checkout_id=").nth(1).unwrap();
        assert!(checkout_id.starts_with(&format!("dummy.{}.", user.id)));

        let order = provider.get_paid_order(checkout_id).await.unwrap().unwrap();
        assert_eq!(order.order_id, checkout_id);
        assert_eq!(order.customer_id, Some(user.id.to_string()));
        assert_eq!(order.product_id.as_deref(), Some(product.product_id.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_session_ids() {
        let provider = DummyProvider::from(DummyConfig::default());
        for id in ["", "dummy", "stripe.a.b.c", "dummy.user.product", "dummy.user..nonce"] {
            assert!(
                matches!(provider.get_paid_order(id).await, Err(PaymentError::InvalidData(_))),
                "{id}"
            );
        }
    }

    #[tokio::test]
    async fn test_webhooks_rejected_without_secret() {
        let provider = DummyProvider::from(DummyConfig::default());
        let body = serde_json::json!({"type": "order.paid", "data": {"id": "ord_1", "product_id": "p"}}).to_string();

        assert!(matches!(
            provider.validate_webhook(&HeaderMap::new(), body.as_bytes()).await,
            Err(PaymentError::UnverifiedEvent)
        ));

        // A signature cannot help when there is nothing to check it against
        let now = Utc::now().timestamp();
        let signature = sign_payload("msg_1", now, body.as_bytes(), "any-secret").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", HeaderValue::from_static("msg_1"));
        headers.insert("webhook-timestamp", HeaderValue::from_str(&now.to_string()).unwrap());
        headers.insert("webhook-signature", HeaderValue::from_str(&signature).unwrap());
        assert!(matches!(
            provider.validate_webhook(&headers, body.as_bytes()).await,
            Err(PaymentError::UnverifiedEvent)
        ));
    }

    #[tokio::test]
    async fn test_signed_webhooks_with_secret() {
        let provider = DummyProvider::from(DummyConfig {
            webhook_secret: Some("dummy-secret".to_string()),
        });
        let body = serde_json::json!({"type": "order.paid", "data": {"id": "ord_1", "product_id": "p"}}).to_string();

        assert!(matches!(
            provider.validate_webhook(&HeaderMap::new(), body.as_bytes()).await,
            Err(PaymentError::UnverifiedEvent)
        ));

        let now = Utc::now().timestamp();
        let signature = sign_payload("msg_1", now, body.as_bytes(), "dummy-secret").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", HeaderValue::from_static("msg_1"));
        headers.insert("webhook-timestamp", HeaderValue::from_str(&now.to_string()).unwrap());
        headers.insert("webhook-signature", HeaderValue::from_str(&signature).unwrap());

        assert!(provider.validate_webhook(&headers, body.as_bytes()).await.unwrap().is_some());
    }
}
