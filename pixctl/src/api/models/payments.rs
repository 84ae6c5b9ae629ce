//! API request/response models for checkout and payment webhooks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Credit pack slug, e.g. "small", "medium" or "large"
    pub product: String,
}

/// A provider-hosted page to redirect the browser to
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// Credits were added by this call
    Credited,
    /// The order was already fulfilled earlier
    AlreadyProcessed,
    /// Fulfillment will arrive by webhook
    Pending,
    /// The event type is not one that grants credits
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FulfillmentResponse {
    pub status: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_added: Option<i64>,
}

impl FulfillmentResponse {
    pub fn new(status: FulfillmentStatus) -> Self {
        Self {
            status,
            credits_added: None,
        }
    }

    pub fn credited(amount: i64) -> Self {
        Self {
            status: FulfillmentStatus::Credited,
            credits_added: Some(amount),
        }
    }
}
