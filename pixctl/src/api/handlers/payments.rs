//! HTTP handlers for credit pack checkout and payment webhooks.

use crate::{
    AppState,
    api::models::{
        payments::{CheckoutRequest, FulfillmentResponse, FulfillmentStatus, RedirectResponse},
        users::CurrentUser,
    },
    errors::{Error, Result},
    metrics,
    payment_providers::{CHECKOUT_ID_PLACEHOLDER, Fulfillment, PaymentProvider, fulfill},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use std::sync::Arc;

fn provider(state: &AppState) -> Result<&Arc<dyn PaymentProvider>> {
    state.payment_provider.as_ref().ok_or(Error::NotConfigured {
        feature: "Payment provider",
    })
}

fn dashboard_url(state: &AppState) -> String {
    format!("{}/dashboard", state.config.dashboard_url.trim_end_matches('/'))
}

fn fulfillment_response(fulfillment: Fulfillment) -> FulfillmentResponse {
    match fulfillment {
        Fulfillment::Credited(transaction) => FulfillmentResponse::credited(transaction.amount),
        Fulfillment::AlreadyProcessed => FulfillmentResponse::new(FulfillmentStatus::AlreadyProcessed),
    }
}

/// Start a checkout for a credit pack
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    summary = "Create checkout",
    description = "Create a hosted checkout for one credit pack (`small`, `medium` or `large`) and return its URL. \
    After payment the user lands back on the dashboard with `checkout_id` in the query string.",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout URL", body = RedirectResponse),
        (status = 400, description = "Unknown product", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 501, description = "No payment provider configured", body = crate::errors::ErrorBody),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<RedirectResponse>> {
    let provider = provider(&state)?;
    let product = state
        .config
        .credits
        .product_by_slug(request.product.trim())
        .ok_or_else(|| Error::BadRequest {
            message: format!("Unknown product '{}'", request.product),
        })?;

    let success_url = format!("{}?checkout_id={CHECKOUT_ID_PLACEHOLDER}", dashboard_url(&state));
    let url = provider.create_checkout_session(&user, product, &success_url).await?;

    tracing::info!(product = %product.slug, "Created checkout");
    Ok(Json(RedirectResponse { url }))
}

/// Open the customer portal
#[utoipa::path(
    post,
    path = "/payments/portal",
    tag = "payments",
    summary = "Create customer portal session",
    description = "Return a URL for the payment provider's customer portal, where orders and receipts are listed",
    responses(
        (status = 200, description = "Portal URL", body = RedirectResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 501, description = "No payment provider configured", body = crate::errors::ErrorBody),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_portal_session(State(state): State<AppState>, user: CurrentUser) -> Result<Json<RedirectResponse>> {
    let url = provider(&state)?
        .create_billing_portal_session(&user, &dashboard_url(&state))
        .await?;
    Ok(Json(RedirectResponse { url }))
}

/// Confirm a checkout after the redirect
#[utoipa::path(
    patch,
    path = "/payments/{id}",
    tag = "payments",
    summary = "Confirm checkout",
    description = "Fulfill a completed checkout synchronously when the provider supports it. Providers that only \
    report payments through webhooks answer 202; the credits arrive with the webhook. Confirming twice credits once.",
    params(
        ("id" = String, Path, description = "Checkout ID from the success redirect"),
    ),
    responses(
        (status = 200, description = "Checkout fulfilled", body = FulfillmentResponse),
        (status = 202, description = "Fulfillment will arrive by webhook", body = FulfillmentResponse),
        (status = 400, description = "Malformed checkout ID", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Checkout belongs to another user", body = crate::errors::ErrorBody),
        (status = 501, description = "No payment provider configured", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn confirm_checkout(
    State(state): State<AppState>,
    Path(checkout_id): Path<String>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<FulfillmentResponse>)> {
    let provider = provider(&state)?;

    let Some(order) = provider.get_paid_order(&checkout_id).await? else {
        return Ok((StatusCode::ACCEPTED, Json(FulfillmentResponse::new(FulfillmentStatus::Pending))));
    };

    if order.customer_id.as_deref() != Some(user.id.to_string().as_str()) {
        return Err(Error::NotFound {
            resource: "Checkout".to_string(),
            id: checkout_id,
        });
    }

    let fulfillment = fulfill(state.ledger.as_ref(), &state.config.credits, provider.name(), &order).await?;
    Ok((StatusCode::OK, Json(fulfillment_response(fulfillment))))
}

/// Payment provider webhook.
///
/// Not part of the client API. The signature is checked before anything else; every outcome is
/// counted by the webhook metric.
#[tracing::instrument(skip_all)]
pub async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<FulfillmentResponse>> {
    let provider = provider(&state)?;

    let result = async {
        let Some(order) = provider.validate_webhook(&headers, &body).await? else {
            return Ok(FulfillmentResponse::new(FulfillmentStatus::Ignored));
        };
        let fulfillment = fulfill(state.ledger.as_ref(), &state.config.credits, provider.name(), &order).await?;
        Ok::<_, crate::payment_providers::PaymentError>(fulfillment_response(fulfillment))
    }
    .await;

    match result {
        Ok(response) => {
            let outcome = match response.status {
                FulfillmentStatus::Credited => "fulfilled",
                FulfillmentStatus::AlreadyProcessed => "duplicate",
                _ => "ignored",
            };
            metrics::record_webhook_outcome(outcome);
            Ok(Json(response))
        }
        Err(e) => {
            metrics::record_webhook_outcome(e.code());
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::payments::{FulfillmentResponse, FulfillmentStatus, RedirectResponse},
        build_router,
        config::{Config, DummyConfig, PaymentConfig},
        ledger::{CreditsLedger, InMemoryLedger},
        test_utils::{auth_header, create_test_config, create_test_state, create_test_user, webhook_headers},
    };
    use axum::http::StatusCode;
    use axum_test::{TestResponse, TestServer};
    use serde_json::{Value, json};
    use std::sync::Arc;

    const SMALL: &str = "5af2909c-3272-4bc2-bae8-a7e91958d37f";
    const LARGE: &str = "dcd55a8e-0515-43f6-b2fc-f1849753e609";

    fn setup(config: Config) -> (TestServer, Arc<InMemoryLedger>, Config) {
        let (state, ledger) = create_test_state(config.clone());
        (TestServer::new(build_router(&state).unwrap()).unwrap(), ledger, config)
    }

    fn order_paid(order_id: &str, customer: &str, product: &str) -> Value {
        json!({
            "type": "order.paid",
            "data": {
                "id": order_id,
                "product_id": product,
                "customer": {"external_id": customer}
            }
        })
    }

    async fn post_webhook(server: &TestServer, msg_id: &str, event: &Value) -> TestResponse {
        let body = event.to_string();
        let mut request = server
            .post("/webhooks/payments")
            .bytes(body.clone().into())
            .content_type("application/json");
        for (name, value) in webhook_headers(msg_id, body.as_bytes()) {
            request = request.add_header(name, value);
        }
        request.await
    }

    #[tokio::test]
    async fn test_checkout_then_confirm_credits_once() {
        let (server, ledger, config) = setup(create_test_config());
        let user = create_test_user(&ledger, 3);
        let (name, value) = auth_header(&user, &config);

        let checkout: RedirectResponse = server
            .post("/api/v1/payments")
            .add_header(&name, &value)
            .json(&json!({"product": "small"}))
            .await
            .json();
        assert!(checkout.url.starts_with("http://localhost:3000/dashboard?checkout_id=dummy."));
        let checkout_id = checkout.url.split("checkout_id=").nth(1).unwrap().to_string();

        let response = server
            .patch(&format!("/api/v1/payments/{checkout_id}"))
            .add_header(&name, &value)
            .await;
        response.assert_status_ok();
        let fulfilled: FulfillmentResponse = response.json();
        assert_eq!(fulfilled.status, FulfillmentStatus::Credited);
        assert_eq!(fulfilled.credits_added, Some(70));

        let replay: FulfillmentResponse = server
            .patch(&format!("/api/v1/payments/{checkout_id}"))
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(replay.status, FulfillmentStatus::AlreadyProcessed);
        assert_eq!(ledger.balance(user.id).await.unwrap(), 73);
    }

    #[tokio::test]
    async fn test_checkout_rejects_unknown_product() {
        let (server, ledger, config) = setup(create_test_config());
        let user = create_test_user(&ledger, 0);
        let (name, value) = auth_header(&user, &config);

        let response = server
            .post("/api/v1/payments")
            .add_header(&name, &value)
            .json(&json!({"product": "huge"}))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_confirm_someone_elses_checkout() {
        let (server, ledger, config) = setup(create_test_config());
        let buyer = create_test_user(&ledger, 0);
        let other = create_test_user(&ledger, 0);
        let (name, value) = auth_header(&other, &config);

        let checkout_id = format!("dummy.{}.{SMALL}.nonce", buyer.id);
        let response = server
            .patch(&format!("/api/v1/payments/{checkout_id}"))
            .add_header(&name, &value)
            .await;
        response.assert_status_not_found();
        assert_eq!(ledger.balance(buyer.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_portal_returns_to_dashboard() {
        let (server, ledger, config) = setup(create_test_config());
        let user = create_test_user(&ledger, 0);
        let (name, value) = auth_header(&user, &config);

        let portal: RedirectResponse = server.post("/api/v1/payments/portal").add_header(&name, &value).await.json();
        assert_eq!(portal.url, "http://localhost:3000/dashboard");
    }

    #[tokio::test]
    async fn test_payments_not_configured() {
        let config = Config {
            payment: None,
            ..create_test_config()
        };
        let (server, ledger, config) = setup(config);
        let user = create_test_user(&ledger, 0);
        let (name, value) = auth_header(&user, &config);

        let response = server
            .post("/api/v1/payments")
            .add_header(&name, &value)
            .json(&json!({"product": "small"}))
            .await;
        response.assert_status(StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.json::<Value>()["error"], "not_configured");

        post_webhook(&server, "msg_1", &order_paid("ord_1", &user.id.to_string(), SMALL))
            .await
            .assert_status(StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_webhook_fulfills_once() {
        let (server, ledger, _) = setup(create_test_config());
        let user = create_test_user(&ledger, 10);
        let event = order_paid("ord_42", &user.id.to_string(), LARGE);

        let first: FulfillmentResponse = post_webhook(&server, "msg_1", &event).await.json();
        assert_eq!(first.status, FulfillmentStatus::Credited);
        assert_eq!(first.credits_added, Some(300));

        // Redelivery carries a fresh timestamp and signature
        let response = post_webhook(&server, "msg_1", &event).await;
        response.assert_status_ok();
        assert_eq!(response.json::<FulfillmentResponse>().status, FulfillmentStatus::AlreadyProcessed);

        assert_eq!(ledger.balance(user.id).await.unwrap(), 310);
    }

    #[tokio::test]
    async fn test_webhook_rejections() {
        let (server, ledger, _) = setup(create_test_config());
        let user = create_test_user(&ledger, 0);

        let response = post_webhook(&server, "msg_1", &order_paid("ord_1", &user.id.to_string(), "prod_unknown")).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "unknown_product");

        let response = post_webhook(&server, "msg_2", &order_paid("ord_2", "not-a-user", SMALL)).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "unknown_customer");

        let response = post_webhook(&server, "msg_3", &order_paid("ord_3", &uuid::Uuid::new_v4().to_string(), SMALL)).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "user_not_found");

        let mut malformed = server
            .post("/webhooks/payments")
            .bytes("not json".into())
            .content_type("application/json");
        for (name, value) in webhook_headers("msg_4", b"not json") {
            malformed = malformed.add_header(name, value);
        }
        malformed.await.assert_status_bad_request();

        assert_eq!(ledger.balance(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_ignores_other_events() {
        let (server, _, _) = setup(create_test_config());

        let response: FulfillmentResponse =
            post_webhook(&server, "msg_1", &json!({"type": "checkout.created", "data": {"id": "chk_1"}}))
                .await
                .json();
        assert_eq!(response.status, FulfillmentStatus::Ignored);
    }

    #[tokio::test]
    async fn test_unsigned_webhook_is_rejected() {
        let (server, ledger, _) = setup(create_test_config());
        let user = create_test_user(&ledger, 0);
        let event = order_paid("ord_unsigned", &user.id.to_string(), SMALL);

        let response = server.post("/webhooks/payments").json(&event).await;
        response.assert_status_unauthorized();
        assert_eq!(response.json::<Value>()["error"], "unverified_event");

        let mut forged = server.post("/webhooks/payments").json(&event);
        for (name, value) in webhook_headers("msg_1", b"{}") {
            forged = forged.add_header(name, value);
        }
        forged.await.assert_status_unauthorized();

        assert_eq!(ledger.balance(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dummy_without_secret_rejects_every_webhook() {
        let config = Config {
            payment: Some(PaymentConfig::Dummy(DummyConfig::default())),
            ..create_test_config()
        };
        let (server, ledger, config) = setup(config);
        let user = create_test_user(&ledger, 0);

        let response = server
            .post("/webhooks/payments")
            .json(&order_paid("ord_free", &user.id.to_string(), LARGE))
            .await;
        response.assert_status_unauthorized();
        assert_eq!(response.json::<Value>()["error"], "unverified_event");
        assert_eq!(ledger.balance(user.id).await.unwrap(), 0);

        // Synchronous confirmation still works
        let (name, value) = auth_header(&user, &config);
        let checkout_id = format!("dummy.{}.{SMALL}.nonce", user.id);
        server
            .patch(&format!("/api/v1/payments/{checkout_id}"))
            .add_header(&name, &value)
            .await
            .assert_status_ok();
        assert_eq!(ledger.balance(user.id).await.unwrap(), 70);
    }
}
