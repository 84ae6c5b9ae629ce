//! HTTP handlers for the signed-in user's account and credits.

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        transactions::{CreditTransactionResponse, DebitResponse},
        users::{CreditsResponse, CurrentUser, DebitRequest, UserResponse},
    },
    db::models::credits::CreditTransactionCreateDBRequest,
    errors::Result,
    metrics,
};
use axum::{
    extract::{Query, State},
    response::Json,
};

/// Get the current user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Get current user",
    description = "Account details of the signed-in user, including the credit balance",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "No account exists for this session", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let account = state.ledger.account(current_user.id).await?;
    Ok(Json(UserResponse::from(account)))
}

/// Get the current user's balance
#[utoipa::path(
    get,
    path = "/users/me/credits",
    tag = "users",
    summary = "Get credit balance",
    responses(
        (status = 200, description = "Current balance", body = CreditsResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "No account exists for this session", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_credits(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<CreditsResponse>> {
    let credits = state.ledger.balance(current_user.id).await?;
    Ok(Json(CreditsResponse { credits }))
}

/// Spend credits
#[utoipa::path(
    post,
    path = "/users/me/credits/debits",
    tag = "users",
    summary = "Debit credits",
    description = "Take credits from the signed-in user's balance. The amount must be a positive integer \
    and the balance must cover it; otherwise nothing changes.",
    request_body = DebitRequest,
    responses(
        (status = 200, description = "Credits debited", body = DebitResponse),
        (status = 400, description = "Amount is not a positive integer", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 402, description = "Insufficient credits", body = crate::errors::ErrorBody),
        (status = 404, description = "No account exists for this session", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn debit_credits(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<DebitRequest>,
) -> Result<Json<DebitResponse>> {
    let amount = request.amount().inspect_err(|e| metrics::record_debit_rejection(e.code()))?;

    let debit = CreditTransactionCreateDBRequest::usage(current_user.id, amount, request.description);
    let transaction = state
        .ledger
        .debit(&debit)
        .await
        .inspect_err(|e| metrics::record_debit_rejection(e.code()))?;
    metrics::record_credit_debit("direct", amount);

    Ok(Json(DebitResponse {
        credits: transaction.balance_after,
        transaction: CreditTransactionResponse::from(transaction),
    }))
}

/// List the current user's transactions
#[utoipa::path(
    get,
    path = "/users/me/transactions",
    tag = "users",
    summary = "List credit transactions",
    description = "Purchases, usage and refunds of the signed-in user, newest first",
    params(Pagination),
    responses(
        (status = 200, description = "Page of transactions", body = PaginatedResponse<CreditTransactionResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<CreditTransactionResponse>>> {
    let (skip, limit) = pagination.params();
    let page = state.ledger.list_transactions(current_user.id, skip, limit).await?;

    let data = page.transactions.into_iter().map(CreditTransactionResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, page.total_count, &pagination)))
}
