//! API response models for the credit transaction log.

use crate::db::models::credits::{CreditTransactionDBResponse, CreditTransactionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditTransactionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub transaction_type: CreditTransactionType,
    /// Always positive; `transaction_type` gives the direction
    pub amount: i64,
    /// Balance once this transaction was applied
    pub balance_after: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransactionDBResponse> for CreditTransactionResponse {
    fn from(db: CreditTransactionDBResponse) -> Self {
        Self {
            id: db.id,
            transaction_type: db.transaction_type,
            amount: db.amount,
            balance_after: db.balance_after,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

/// Result of a successful debit
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebitResponse {
    /// Balance after the debit
    pub credits: i64,
    pub transaction: CreditTransactionResponse,
}
