//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait, which hides the checkout, customer portal
//! and webhook formats of a payment provider behind one interface. The provider never touches
//! the ledger itself: it turns whatever it receives into a [`PaidOrder`], and [`fulfillment`]
//! decides how many credits that order is worth.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::{api::models::users::CurrentUser, config::PaymentConfig, config::ProductTier, ledger::LedgerError};

pub mod dummy;
pub mod fulfillment;
pub mod polar;

pub use fulfillment::{Fulfillment, fulfill};

/// Placeholder in success URLs that the provider replaces with its checkout id
pub const CHECKOUT_ID_PLACEHOLDER: &str = "{CHECKOUT_ID}";

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
pub fn create_provider(config: PaymentConfig) -> Result<Box<dyn PaymentProvider>> {
    Ok(match config {
        PaymentConfig::Polar(polar_config) => Box::new(polar::PolarProvider::new(polar_config)?),
        PaymentConfig::Dummy(dummy_config) => Box::new(dummy::DummyProvider::from(dummy_config)),
    })
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    /// Signature missing, stale or wrong
    #[error("Webhook signature verification failed")]
    UnverifiedEvent,

    /// The order carries no external customer id, or one that is not a user id
    #[error("Order has no known customer: {0}")]
    UnknownCustomer(String),

    #[error("Product {0} does not grant credits")]
    UnknownProduct(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PaymentError {
    /// Stable reason code, also used as a metrics label
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::ProviderApi(_) => "payment_provider_error",
            PaymentError::UnverifiedEvent => "unverified_event",
            PaymentError::UnknownCustomer(_) => "unknown_customer",
            PaymentError::UnknownProduct(_) => "unknown_product",
            PaymentError::InvalidData(_) => "bad_request",
            PaymentError::Ledger(e) => e.code(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ProviderApi(_) => "Payment provider request failed".to_string(),
            PaymentError::Ledger(LedgerError::UserNotFound(_)) => "Customer is not a known user".to_string(),
            PaymentError::Ledger(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<&PaymentError> for StatusCode {
    fn from(err: &PaymentError) -> Self {
        match err {
            PaymentError::UnverifiedEvent => StatusCode::UNAUTHORIZED,
            PaymentError::UnknownCustomer(_)
            | PaymentError::UnknownProduct(_)
            | PaymentError::Ledger(LedgerError::UserNotFound(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::InvalidData(_) => StatusCode::BAD_REQUEST,
            PaymentError::ProviderApi(_) => StatusCode::BAD_GATEWAY,
            // Anything else makes the provider retry the delivery
            PaymentError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::ProviderApi(err.to_string())
    }
}

/// A paid order, as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidOrder {
    /// Provider order id; the idempotency key for fulfillment
    pub order_id: String,
    /// External customer id set at checkout, expected to be our user id
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short name used in transaction source ids, e.g. `polar`
    fn name(&self) -> &'static str;

    /// Create a hosted checkout for one credit pack
    ///
    /// Returns a URL that the user should be redirected to for payment. `success_url` may contain
    /// [`CHECKOUT_ID_PLACEHOLDER`].
    async fn create_checkout_session(&self, user: &CurrentUser, product: &ProductTier, success_url: &str) -> Result<String>;

    /// Create a customer portal session for order history and receipts
    async fn create_billing_portal_session(&self, user: &CurrentUser, return_url: &str) -> Result<String>;

    /// Verify a webhook delivery and extract the paid order it reports
    ///
    /// Returns `Ok(None)` for verified events that do not grant credits.
    /// Returns `Err(UnverifiedEvent)` if the signature does not check out.
    async fn validate_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<PaidOrder>>;

    /// Look up a completed checkout synchronously
    ///
    /// Returns `Ok(None)` for providers that only fulfill through webhooks.
    async fn get_paid_order(&self, checkout_id: &str) -> Result<Option<PaidOrder>>;
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OrderPayload {
    id: String,
    product_id: Option<String>,
    customer: Option<OrderCustomer>,
}

#[derive(Debug, Deserialize)]
struct OrderCustomer {
    external_id: Option<String>,
}

/// Event type that grants credits
pub const ORDER_PAID_EVENT: &str = "order.paid";

/// Parse an `order.paid` webhook body; other event types yield `None`
pub(crate) fn parse_order_event(body: &[u8]) -> Result<Option<PaidOrder>> {
    let envelope: WebhookEnvelope =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidData(format!("webhook body: {e}")))?;

    if envelope.event_type != ORDER_PAID_EVENT {
        tracing::debug!(event_type = %envelope.event_type, "Ignoring webhook event");
        return Ok(None);
    }

    let order: OrderPayload =
        serde_json::from_value(envelope.data).map_err(|e| PaymentError::InvalidData(format!("order payload: {e}")))?;

    Ok(Some(PaidOrder {
        order_id: order.id,
        customer_id: order.customer.and_then(|c| c.external_id),
        product_id: order.product_id,
    }))
}
