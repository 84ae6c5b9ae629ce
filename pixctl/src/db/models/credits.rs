//! Database models for credit transactions.

use crate::types::{TransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Credit transaction type, stored as TEXT in the database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    /// Credits bought through the payment provider
    Purchase,
    /// Credits spent on a paid operation
    Usage,
    /// Compensation for a usage debit that could not be honoured
    Refund,
}

impl CreditTransactionType {
    /// Whether this transaction adds to the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Purchase | Self::Refund)
    }
}

impl fmt::Display for CreditTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purchase => write!(f, "purchase"),
            Self::Usage => write!(f, "usage"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown credit transaction type: {0}")]
pub struct UnknownTransactionType(String);

impl TryFrom<String> for CreditTransactionType {
    type Error = UnknownTransactionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "purchase" => Ok(Self::Purchase),
            "usage" => Ok(Self::Usage),
            "refund" => Ok(Self::Refund),
            _ => Err(UnknownTransactionType(value)),
        }
    }
}

/// Database request for creating a new credit transaction
#[derive(Debug, Clone)]
pub struct CreditTransactionCreateDBRequest {
    pub user_id: UserId,
    pub transaction_type: CreditTransactionType,
    /// Always positive; the direction comes from `transaction_type`
    pub amount: i64,
    /// Idempotency key, unique across the ledger
    pub source_id: String,
    pub description: Option<String>,
}

impl CreditTransactionCreateDBRequest {
    /// A usage debit with a freshly generated source id
    pub fn usage(user_id: UserId, amount: i64, description: Option<String>) -> Self {
        Self {
            user_id,
            transaction_type: CreditTransactionType::Usage,
            amount,
            source_id: format!("usage:{}", uuid::Uuid::new_v4()),
            description,
        }
    }

    /// A purchase keyed on the provider's order identifier
    pub fn purchase(user_id: UserId, amount: i64, provider: &str, event_id: &str, description: Option<String>) -> Self {
        Self {
            user_id,
            transaction_type: CreditTransactionType::Purchase,
            amount,
            source_id: format!("order:{provider}:{event_id}"),
            description,
        }
    }

    /// A refund that compensates the given usage transaction
    pub fn refund(user_id: UserId, amount: i64, debit_id: TransactionId, description: Option<String>) -> Self {
        Self {
            user_id,
            transaction_type: CreditTransactionType::Refund,
            amount,
            source_id: format!("refund:{debit_id}"),
            description,
        }
    }
}

/// Database response for a credit transaction
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CreditTransactionDBResponse {
    pub id: TransactionId,
    pub user_id: UserId,
    #[sqlx(try_from = "String")]
    pub transaction_type: CreditTransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub source_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
