//! Polar payment provider implementation
//!
//! Checkouts and customer portal sessions are created through the Polar REST API, keyed on our
//! user id as Polar's `external_customer_id`. Credits are granted when Polar delivers the
//! `order.paid` webhook; there is no synchronous confirmation.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use crate::{
    api::models::users::CurrentUser,
    config::{PolarConfig, ProductTier},
    payment_providers::{PaidOrder, PaymentError, PaymentProvider, Result, parse_order_event},
    webhooks::verify_webhook,
};

pub struct PolarProvider {
    http_client: reqwest::Client,
    config: PolarConfig,
}

impl PolarProvider {
    pub fn new(config: PolarConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http_client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// POST a JSON body and decode the JSON response
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, path, "Polar API request failed: {text}");
            return Err(PaymentError::ProviderApi(format!("{path} returned {status}")));
        }

        Ok(response.json::<R>().await?)
    }
}

#[derive(Debug, Serialize)]
struct CheckoutCreate<'a> {
    products: [&'a str; 1],
    external_customer_id: String,
    customer_email: &'a str,
    customer_name: &'a str,
    success_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct Checkout {
    url: String,
}

#[derive(Debug, Serialize)]
struct CustomerSessionCreate {
    external_customer_id: String,
}

#[derive(Debug, Deserialize)]
struct CustomerSession {
    customer_portal_url: String,
}

#[async_trait]
impl PaymentProvider for PolarProvider {
    fn name(&self) -> &'static str {
        "polar"
    }

    #[tracing::instrument(skip_all, fields(user_id = %user.id, product = %product.slug), err)]
    async fn create_checkout_session(&self, user: &CurrentUser, product: &ProductTier, success_url: &str) -> Result<String> {
        let request = CheckoutCreate {
            products: [product.product_id.as_str()],
            external_customer_id: user.id.to_string(),
            customer_email: &user.email,
            customer_name: &user.name,
            success_url,
        };

        let checkout: Checkout = self.post("/v1/checkouts/", &request).await?;
        tracing::debug!("Created Polar checkout");
        Ok(checkout.url)
    }

    #[tracing::instrument(skip_all, fields(user_id = %user.id), err)]
    async fn create_billing_portal_session(&self, user: &CurrentUser, return_url: &str) -> Result<String> {
        let request = CustomerSessionCreate {
            external_customer_id: user.id.to_string(),
        };

        let session: CustomerSession = self.post("/v1/customer-sessions/", &request).await?;
        tracing::debug!(return_url, "Created Polar customer session");
        Ok(session.customer_portal_url)
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<PaidOrder>> {
        verify_webhook(headers, body, &self.config.webhook_secret, Utc::now().timestamp()).map_err(|e| {
            tracing::warn!("Polar webhook rejected: {e}");
            PaymentError::UnverifiedEvent
        })?;

        parse_order_event(body)
    }

    async fn get_paid_order(&self, _checkout_id: &str) -> Result<Option<PaidOrder>> {
        // Fulfillment arrives via the order.paid webhook
        Ok(None)
    }
}
