//! Database repository for the credit transaction log.
//!
//! `credit_transactions` is append-only. The `users.credits` column is a projection of the log
//! that is updated in the same database transaction as every append, so reads never have to fold
//! the history.

use crate::{
    db::{
        errors::{DbError, Result},
        models::credits::{CreditTransactionCreateDBRequest, CreditTransactionDBResponse},
    },
    types::{UserId, abbrev_uuid},
};
use sqlx::{Connection, PgConnection};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Unique constraint guarding idempotent appends
pub const SOURCE_ID_CONSTRAINT: &str = "credit_transactions_source_id_unique";

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, balance_after, source_id, description, created_at";

/// Result of attempting to take credits from a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitResult {
    Debited(CreditTransactionDBResponse),
    Insufficient { balance: i64 },
    UnknownUser,
}

/// Result of attempting to add credits to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditResult {
    Credited(CreditTransactionDBResponse),
    /// A transaction with the same source id already exists
    Duplicate,
    UnknownUser,
}

pub struct Credits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Take `request.amount` credits from the user if the balance covers it.
    ///
    /// The conditional update makes the balance check and the decrement a single statement, so
    /// concurrent debits cannot both pass the check.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), amount = request.amount), err)]
    pub async fn debit(&mut self, request: &CreditTransactionCreateDBRequest) -> Result<DebitResult> {
        let mut tx = self.db.begin().await?;

        let balance_after = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET credits = credits - $2, updated_at = NOW() WHERE id = $1 AND credits >= $2 RETURNING credits",
        )
        .bind(request.user_id)
        .bind(request.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance_after) = balance_after else {
            let current = sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = $1")
                .bind(request.user_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Ok(match current {
                Some(balance) => DebitResult::Insufficient { balance },
                None => DebitResult::UnknownUser,
            });
        };

        let transaction = Self::insert_transaction(&mut tx, request, balance_after).await?;
        tx.commit().await?;

        Ok(DebitResult::Debited(transaction))
    }

    /// Add `request.amount` credits to the user, at most once per `source_id`.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), amount = request.amount, source_id = %request.source_id), err)]
    pub async fn credit(&mut self, request: &CreditTransactionCreateDBRequest) -> Result<CreditResult> {
        // Fast path: most replays are sequential
        if self.get_by_source_id(&request.source_id).await?.is_some() {
            debug!("Transaction already recorded for source id");
            return Ok(CreditResult::Duplicate);
        }

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
            .bind(request.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(CreditResult::UnknownUser);
        };

        let balance_after = current
            .checked_add(request.amount)
            .ok_or_else(|| DbError::Other(anyhow::anyhow!("credit balance overflow for user {}", request.user_id)))?;

        let transaction = match Self::insert_transaction(&mut tx, request, balance_after).await {
            Ok(transaction) => transaction,
            // A concurrent delivery of the same event won the race
            Err(e) if e.is_unique_violation_of(SOURCE_ID_CONSTRAINT) => {
                tx.rollback().await?;
                debug!("Concurrent transaction recorded for source id");
                return Ok(CreditResult::Duplicate);
            }
            Err(e) => return Err(e),
        };

        sqlx::query("UPDATE users SET credits = $2, updated_at = NOW() WHERE id = $1")
            .bind(request.user_id)
            .bind(balance_after)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CreditResult::Credited(transaction))
    }

    /// Look up a transaction by its idempotency key
    pub async fn get_by_source_id(&mut self, source_id: &str) -> Result<Option<CreditTransactionDBResponse>> {
        let transaction = sqlx::query_as::<_, CreditTransactionDBResponse>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions WHERE source_id = $1"
        ))
        .bind(source_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(transaction)
    }

    /// List transactions for a specific user with pagination, newest first
    pub async fn list_user_transactions(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<CreditTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, CreditTransactionDBResponse>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions)
    }

    /// Count transactions for a specific user
    pub async fn count_user_transactions(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    async fn insert_transaction(
        conn: &mut PgConnection,
        request: &CreditTransactionCreateDBRequest,
        balance_after: i64,
    ) -> Result<CreditTransactionDBResponse> {
        let transaction = sqlx::query_as::<_, CreditTransactionDBResponse>(&format!(
            r#"
            INSERT INTO credit_transactions (id, user_id, transaction_type, amount, balance_after, source_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.transaction_type.to_string())
        .bind(request.amount)
        .bind(balance_after)
        .bind(&request.source_id)
        .bind(&request.description)
        .fetch_one(conn)
        .await?;

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        handlers::{Repository, Users},
        models::{credits::CreditTransactionType, users::UserCreateDBRequest},
    };
    use sqlx::PgPool;

    async fn create_user(pool: &PgPool, credits: i64) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        let id = Uuid::new_v4();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                id,
                name: "Ledger User".to_string(),
                email: format!("{id}@example.com"),
                credits,
            })
            .await
            .unwrap();
        id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_debit_within_balance(pool: PgPool) {
        let user_id = create_user(&pool, 5).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut credits = Credits::new(&mut conn);

        let result = credits
            .debit(&CreditTransactionCreateDBRequest::usage(user_id, 2, None))
            .await
            .unwrap();
        let DebitResult::Debited(transaction) = result else {
            panic!("expected debit, got {result:?}");
        };
        assert_eq!(transaction.transaction_type, CreditTransactionType::Usage);
        assert_eq!(transaction.balance_after, 3);

        let mut users = Users::new(&mut conn);
        assert_eq!(users.get_balance(user_id).await.unwrap(), Some(3));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_debit_insufficient_leaves_balance(pool: PgPool) {
        let user_id = create_user(&pool, 1).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut credits = Credits::new(&mut conn);

        let result = credits
            .debit(&CreditTransactionCreateDBRequest::usage(user_id, 2, None))
            .await
            .unwrap();
        assert_eq!(result, DebitResult::Insufficient { balance: 1 });
        assert_eq!(credits.count_user_transactions(user_id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_debit_unknown_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut credits = Credits::new(&mut conn);

        let result = credits
            .debit(&CreditTransactionCreateDBRequest::usage(Uuid::new_v4(), 1, None))
            .await
            .unwrap();
        assert_eq!(result, DebitResult::UnknownUser);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_debits_never_overdraw(pool: PgPool) {
        let user_id = create_user(&pool, 2).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                Credits::new(&mut conn)
                    .debit(&CreditTransactionCreateDBRequest::usage(user_id, 2, None))
                    .await
                    .unwrap()
            }));
        }

        let mut debited = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), DebitResult::Debited(_)) {
                debited += 1;
            }
        }
        assert_eq!(debited, 1);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(Users::new(&mut conn).get_balance(user_id).await.unwrap(), Some(0));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_credit_is_idempotent_per_source(pool: PgPool) {
        let user_id = create_user(&pool, 0).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut credits = Credits::new(&mut conn);

        let request = CreditTransactionCreateDBRequest::purchase(user_id, 70, "polar", "ord_1", None);
        let first = credits.credit(&request).await.unwrap();
        assert!(matches!(first, CreditResult::Credited(ref t) if t.balance_after == 70));

        let second = credits.credit(&request).await.unwrap();
        assert_eq!(second, CreditResult::Duplicate);
        assert_eq!(credits.count_user_transactions(user_id).await.unwrap(), 1);

        let listed = credits.list_user_transactions(user_id, 0, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source_id, "order:polar:ord_1");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_credit_unknown_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut credits = Credits::new(&mut conn);

        let request = CreditTransactionCreateDBRequest::purchase(Uuid::new_v4(), 70, "polar", "ord_2", None);
        assert_eq!(credits.credit(&request).await.unwrap(), CreditResult::UnknownUser);
    }
}
