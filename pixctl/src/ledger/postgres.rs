//! PostgreSQL-backed ledger.

use super::{CreditOutcome, CreditsLedger, LedgerError, Result, TransactionPage, check_credit, check_debit};
use crate::{
    db::{
        errors::DbError,
        handlers::{
            Credits, Repository, Users,
            credits::{CreditResult, DebitResult},
        },
        models::{
            credits::{CreditTransactionCreateDBRequest, CreditTransactionDBResponse},
            users::UserDBResponse,
        },
    },
    types::{UserId, abbrev_uuid},
};
use sqlx::PgPool;
use tracing::instrument;

#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CreditsLedger for PostgresLedger {
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn account(&self, user_id: UserId) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Users::new(&mut conn)
            .get_by_id(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), amount = request.amount), err)]
    async fn debit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditTransactionDBResponse> {
        check_debit(request)?;

        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        match Credits::new(&mut conn).debit(request).await? {
            DebitResult::Debited(transaction) => Ok(transaction),
            DebitResult::Insufficient { balance } => Err(LedgerError::InsufficientCredits {
                balance,
                required: request.amount,
            }),
            DebitResult::UnknownUser => Err(LedgerError::UserNotFound(request.user_id)),
        }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), source_id = %request.source_id), err)]
    async fn credit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditOutcome> {
        check_credit(request)?;

        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        match Credits::new(&mut conn).credit(request).await? {
            CreditResult::Credited(transaction) => Ok(CreditOutcome::Applied(transaction)),
            CreditResult::Duplicate => Ok(CreditOutcome::Duplicate),
            CreditResult::UnknownUser => Err(LedgerError::UserNotFound(request.user_id)),
        }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn list_transactions(&self, user_id: UserId, skip: i64, limit: i64) -> Result<TransactionPage> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let mut credits = Credits::new(&mut conn);
        let transactions = credits.list_user_transactions(user_id, skip, limit).await?;
        let total_count = credits.count_user_transactions(user_id).await?;

        Ok(TransactionPage { transactions, total_count })
    }
}
