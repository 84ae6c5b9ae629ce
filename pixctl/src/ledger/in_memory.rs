//! In-memory ledger.
//!
//! Balances live in a [`DashMap`] keyed by user. Each balance change happens while holding the
//! user's entry lock, which serializes concurrent debits for the same user. State is lost on
//! restart.

use super::{CreditOutcome, CreditsLedger, LedgerError, Result, TransactionPage, check_credit, check_debit};
use crate::{
    db::models::{
        credits::{CreditTransactionCreateDBRequest, CreditTransactionDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
    types::{TransactionId, UserId},
};
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use uuid::Uuid;

struct Account {
    user: UserDBResponse,
    /// Oldest first
    transactions: Vec<CreditTransactionDBResponse>,
}

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    accounts: Arc<DashMap<UserId, Account>>,
    /// Recorded source ids; always locked before an account
    sources: Arc<DashMap<String, TransactionId>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user with an opening balance, replacing any existing account
    pub fn open_account(&self, request: &UserCreateDBRequest) -> UserDBResponse {
        let now = Utc::now();
        let user = UserDBResponse {
            id: request.id,
            name: request.name.clone(),
            email: request.email.clone(),
            credits: request.credits.max(0),
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(
            request.id,
            Account {
                user: user.clone(),
                transactions: Vec::new(),
            },
        );
        user
    }

    fn record(account: &mut Account, request: &CreditTransactionCreateDBRequest) -> CreditTransactionDBResponse {
        let now = Utc::now();
        account.user.updated_at = now;
        let transaction = CreditTransactionDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            transaction_type: request.transaction_type,
            amount: request.amount,
            balance_after: account.user.credits,
            source_id: request.source_id.clone(),
            description: request.description.clone(),
            created_at: now,
        };
        account.transactions.push(transaction.clone());
        transaction
    }
}

#[async_trait::async_trait]
impl CreditsLedger for InMemoryLedger {
    async fn account(&self, user_id: UserId) -> Result<UserDBResponse> {
        self.accounts
            .get(&user_id)
            .map(|account| account.user.clone())
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    async fn debit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditTransactionDBResponse> {
        check_debit(request)?;

        let transaction = {
            let mut account = self
                .accounts
                .get_mut(&request.user_id)
                .ok_or(LedgerError::UserNotFound(request.user_id))?;

            let balance = account.user.credits;
            if balance < request.amount {
                return Err(LedgerError::InsufficientCredits {
                    balance,
                    required: request.amount,
                });
            }
            account.user.credits = balance - request.amount;
            Self::record(&mut account, request)
        };

        self.sources.insert(transaction.source_id.clone(), transaction.id);
        Ok(transaction)
    }

    async fn credit(&self, request: &CreditTransactionCreateDBRequest) -> Result<CreditOutcome> {
        check_credit(request)?;

        let Entry::Vacant(source) = self.sources.entry(request.source_id.clone()) else {
            return Ok(CreditOutcome::Duplicate);
        };

        let mut account = self
            .accounts
            .get_mut(&request.user_id)
            .ok_or(LedgerError::UserNotFound(request.user_id))?;

        account.user.credits = account
            .user
            .credits
            .checked_add(request.amount)
            .ok_or(LedgerError::InvalidAmount)?;
        let transaction = Self::record(&mut account, request);
        source.insert(transaction.id);

        Ok(CreditOutcome::Applied(transaction))
    }

    async fn list_transactions(&self, user_id: UserId, skip: i64, limit: i64) -> Result<TransactionPage> {
        let account = self.accounts.get(&user_id).ok_or(LedgerError::UserNotFound(user_id))?;

        let transactions = account
            .transactions
            .iter()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(TransactionPage {
            transactions,
            total_count: account.transactions.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::credits::CreditTransactionType;

    fn ledger_with_user(credits: i64) -> (InMemoryLedger, UserId) {
        let ledger = InMemoryLedger::new();
        let id = Uuid::new_v4();
        ledger.open_account(&UserCreateDBRequest {
            id,
            name: "Ledger User".to_string(),
            email: "ledger@example.com".to_string(),
            credits,
        });
        (ledger, id)
    }

    #[tokio::test]
    async fn test_debit_moves_balance_by_amount() {
        let (ledger, user) = ledger_with_user(5);

        let transaction = ledger.debit(&CreditTransactionCreateDBRequest::usage(user, 2, None)).await.unwrap();
        assert_eq!(transaction.transaction_type, CreditTransactionType::Usage);
        assert_eq!(transaction.balance_after, 3);
        assert_eq!(ledger.balance(user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_debit_exact_balance_reaches_zero() {
        let (ledger, user) = ledger_with_user(2);

        ledger.debit(&CreditTransactionCreateDBRequest::usage(user, 2, None)).await.unwrap();
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_debit_leaves_balance() {
        let (ledger, user) = ledger_with_user(1);

        let err = ledger
            .debit(&CreditTransactionCreateDBRequest::usage(user, 2, None))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredits { balance: 1, required: 2 }));
        assert_eq!(ledger.balance(user).await.unwrap(), 1);
        assert_eq!(ledger.list_transactions(user, 0, 10).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let (ledger, user) = ledger_with_user(5);

        for amount in [0, -3] {
            let err = ledger
                .debit(&CreditTransactionCreateDBRequest::usage(user, amount, None))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount));
        }
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let ledger = InMemoryLedger::new();
        let user = Uuid::new_v4();

        assert!(matches!(
            ledger.debit(&CreditTransactionCreateDBRequest::usage(user, 1, None)).await,
            Err(LedgerError::UserNotFound(id)) if id == user
        ));
        assert!(matches!(
            ledger
                .credit(&CreditTransactionCreateDBRequest::purchase(user, 70, "dummy", "evt_1", None))
                .await,
            Err(LedgerError::UserNotFound(_))
        ));
        // A failed credit must not burn the source id
        ledger.open_account(&UserCreateDBRequest {
            id: user,
            name: "Late".to_string(),
            email: "late@example.com".to_string(),
            credits: 0,
        });
        let outcome = ledger
            .credit(&CreditTransactionCreateDBRequest::purchase(user, 70, "dummy", "evt_1", None))
            .await
            .unwrap();
        assert!(matches!(outcome, CreditOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn test_credit_replay_applies_once() {
        let (ledger, user) = ledger_with_user(0);
        let request = CreditTransactionCreateDBRequest::purchase(user, 140, "polar", "ord_1", None);

        assert!(matches!(ledger.credit(&request).await.unwrap(), CreditOutcome::Applied(_)));
        assert_eq!(ledger.credit(&request).await.unwrap(), CreditOutcome::Duplicate);
        assert_eq!(ledger.balance(user).await.unwrap(), 140);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_exactly_one_succeeds() {
        let (ledger, user) = ledger_with_user(2);

        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.debit(&CreditTransactionCreateDBRequest::usage(user, 2, None)).await })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.debit(&CreditTransactionCreateDBRequest::usage(user, 2, None)).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(LedgerError::InsufficientCredits { .. })))
        );
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_credit_commutes_with_interleaved_debits() {
        let (ledger, user) = ledger_with_user(10);

        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                if i == 5 {
                    ledger
                        .credit(&CreditTransactionCreateDBRequest::purchase(user, 300, "polar", "ord_large", None))
                        .await
                        .map(|_| ())
                } else {
                    ledger
                        .debit(&CreditTransactionCreateDBRequest::usage(user, 1, None))
                        .await
                        .map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 10 + 300 - 9
        assert_eq!(ledger.balance(user).await.unwrap(), 301);
    }

    #[tokio::test]
    async fn test_list_transactions_newest_first() {
        let (ledger, user) = ledger_with_user(10);

        for description in ["first", "second", "third"] {
            ledger
                .debit(&CreditTransactionCreateDBRequest::usage(user, 1, Some(description.to_string())))
                .await
                .unwrap();
        }

        let page = ledger.list_transactions(user, 0, 2).await.unwrap();
        assert_eq!(page.total_count, 3);
        let descriptions: Vec<_> = page.transactions.iter().filter_map(|t| t.description.as_deref()).collect();
        assert_eq!(descriptions, vec!["third", "second"]);

        let page = ledger.list_transactions(user, 2, 2).await.unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert_eq!(page.transactions[0].balance_after, 9);
    }
}
