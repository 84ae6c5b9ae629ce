//! Turning paid orders into credits.
//!
//! The provider's order id is the idempotency key: it becomes the purchase transaction's
//! `order:{provider}:{order_id}` source id, so a redelivered webhook (or a webhook racing a
//! synchronous confirmation) credits the user once.

use super::{PaidOrder, PaymentError, Result};
use crate::{
    config::CreditsConfig,
    db::models::credits::{CreditTransactionCreateDBRequest, CreditTransactionDBResponse},
    ledger::{CreditOutcome, CreditsLedger},
    metrics,
    types::UserId,
};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    Credited(CreditTransactionDBResponse),
    /// The order was fulfilled before; nothing changed
    AlreadyProcessed,
}

/// Credit the customer of `order` with the credits of its product
#[instrument(skip(ledger, catalog, order), fields(order_id = %order.order_id), err)]
pub async fn fulfill(ledger: &dyn CreditsLedger, catalog: &CreditsConfig, provider: &str, order: &PaidOrder) -> Result<Fulfillment> {
    let raw_customer = order
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PaymentError::UnknownCustomer("no external customer id".to_string()))?;
    let user_id: UserId = raw_customer
        .parse()
        .map_err(|_| PaymentError::UnknownCustomer(raw_customer.to_string()))?;

    let product_id = order.product_id.as_deref().unwrap_or_default();
    let tier = catalog
        .product_by_id(product_id)
        .ok_or_else(|| PaymentError::UnknownProduct(product_id.to_string()))?;

    let request = CreditTransactionCreateDBRequest::purchase(
        user_id,
        tier.credits,
        provider,
        &order.order_id,
        Some(format!("Purchased {} credit pack", tier.slug)),
    );

    match ledger.credit(&request).await? {
        CreditOutcome::Applied(transaction) => {
            metrics::record_credit_purchase(tier.credits);
            info!(user_id = %user_id, credits = tier.credits, "Fulfilled order");
            Ok(Fulfillment::Credited(transaction))
        }
        CreditOutcome::Duplicate => {
            info!("Order already fulfilled");
            Ok(Fulfillment::AlreadyProcessed)
        }
    }
}
