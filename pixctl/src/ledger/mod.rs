//! Credits ledger.
//!
//! Every user has a non-negative integer balance. Balance changes are recorded as rows of an
//! append-only transaction log; the balance itself is a projection of that log kept next to
//! the user.
//!
//! - **Debits** are guarded: they fail with [`LedgerError::InsufficientCredits`] instead of
//!   taking the balance below zero, and concurrent debits for the same user are serialized.
//! - **Credits** are additive and idempotent per `source_id`: replaying a source is reported as
//!   [`CreditOutcome::Duplicate`] without touching the balance.
//!
//! Two implementations exist: [`PostgresLedger`] for production and [`InMemoryLedger`] for
//! tests and local development.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

use crate::{
    db::{
        errors::DbError,
        models::{
            credits::{CreditTransactionCreateDBRequest, CreditTransactionDBResponse},
            users::UserDBResponse,
        },
    },
    types::UserId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount was zero, negative or not an integer
    #[error("Amount must be a positive integer")]
    InvalidAmount,

    #[error("Insufficient credits: balance is {balance}, {required} required")]
    InsufficientCredits { balance: i64, required: i64 },

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl LedgerError {
    /// Stable reason code, also used as a metrics label
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::InsufficientCredits { .. } => "insufficient_credits",
            LedgerError::UserNotFound(_) => "user_not_found",
            LedgerError::Database(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Outcome of an idempotent credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Applied(CreditTransactionDBResponse),
    /// The source id was already recorded; nothing changed
    Duplicate,
}

/// A page of a user's transaction log, newest first
#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub transactions: Vec<CreditTransactionDBResponse>,
    pub total_count: i64,
}

#[async_trait::async_trait]
pub trait CreditsLedger: Send + Sync {
    /// The user's account row, including the current balance
    async fn account(&self, user_id: UserId) -> Result<UserDBResponse>;

    /// Take credits if the balance covers them; returns the recorded usage transaction
    async fn debit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditTransactionDBResponse>;

    /// Add credits at most once per `request.source_id`
    async fn credit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditOutcome>;

    async fn list_transactions(&self, user_id: UserId, skip: i64, limit: i64) -> Result<TransactionPage>;

    async fn balance(&self, user_id: UserId) -> Result<i64> {
        Ok(self.account(user_id).await?.credits)
    }
}

/// Reject amounts that cannot move a balance
pub(crate) fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

/// Validate a debit request before it reaches storage
pub(crate) fn check_debit(request: &CreditTransactionCreateDBRequest) -> Result<()> {
    ensure_positive(request.amount)?;
    if request.transaction_type.is_credit() {
        return Err(LedgerError::Database(DbError::Other(anyhow::anyhow!(
            "{} transaction submitted as a debit",
            request.transaction_type
        ))));
    }
    Ok(())
}

/// Validate a credit request before it reaches storage
pub(crate) fn check_credit(request: &CreditTransactionCreateDBRequest) -> Result<()> {
    ensure_positive(request.amount)?;
    if !request.transaction_type.is_credit() {
        return Err(LedgerError::Database(DbError::Other(anyhow::anyhow!(
            "{} transaction submitted as a credit",
            request.transaction_type
        ))));
    }
    Ok(())
}
