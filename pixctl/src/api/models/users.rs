//! API request/response models for the signed-in user and their credits.

use crate::{db::models::users::UserDBResponse, ledger::LedgerError, types::UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated principal, resolved from the session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            credits: db.credits,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditsResponse {
    pub credits: i64,
}

/// Request to spend credits
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DebitRequest {
    /// Positive whole number of credits
    #[schema(value_type = i64, minimum = 1)]
    pub amount: serde_json::Number,
    pub description: Option<String>,
}

impl DebitRequest {
    /// The amount as a positive integer.
    ///
    /// Whole-valued floats such as `2.0` count as integers; fractional, negative, zero and
    /// out-of-range amounts are invalid.
    pub fn amount(&self) -> Result<i64, LedgerError> {
        let amount = match self.amount.as_i64() {
            Some(amount) => Some(amount),
            None => self
                .amount
                .as_f64()
                .filter(|v| v.is_finite() && v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
                .map(|v| v as i64),
        };
        amount.filter(|amount| *amount > 0).ok_or(LedgerError::InvalidAmount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debit(json: serde_json::Value) -> DebitRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_debit_amount_must_be_positive_integer() {
        assert_eq!(debit(serde_json::json!({"amount": 2})).amount().unwrap(), 2);
        assert_eq!(debit(serde_json::json!({"amount": 2.0})).amount().unwrap(), 2);

        for amount in [
            serde_json::json!(0),
            serde_json::json!(-1),
            serde_json::json!(1.5),
            serde_json::json!(-2.0),
            serde_json::json!(0.0),
            serde_json::json!(1e300),
            serde_json::json!(u64::MAX),
        ] {
            let result = debit(serde_json::json!({ "amount": amount })).amount();
            assert!(matches!(result, Err(LedgerError::InvalidAmount)), "{amount}");
        }
    }

    #[test]
    fn test_debit_amount_must_be_a_number() {
        assert!(serde_json::from_value::<DebitRequest>(serde_json::json!({"amount": "2"})).is_err());
    }
}
