//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    api::models::users::CurrentUser,
    assets::ImageKitClient,
    auth::session::create_session_token,
    config::{Config, DummyConfig, ImageKitConfig, PaymentConfig},
    db::models::users::UserCreateDBRequest,
    ledger::InMemoryLedger,
    payment_providers::{PaymentProvider, create_provider},
    projects::InMemoryProjectStore,
    webhooks::sign_payload,
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

pub const TEST_SECRET_KEY: &str = "test-secret-key-for-sessions";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

/// reqwest is built without a default TLS provider
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn create_test_config() -> Config {
    Config {
        secret_key: Some(TEST_SECRET_KEY.to_string()),
        imagekit: ImageKitConfig {
            url_endpoint: "https://ik.imagekit.io/pixctl-test".to_string(),
            public_key: "public_test".to_string(),
            private_key: "private_test".to_string(),
            // Nothing listens here: asset deletion fails fast and is skipped
            api_base_url: "http://127.0.0.1:9".to_string(),
            prefetch_renders: false,
            request_timeout: Duration::from_secs(1),
            ..Default::default()
        },
        payment: Some(PaymentConfig::Dummy(DummyConfig {
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
        })),
        enable_metrics: false,
        ..Default::default()
    }
}

/// Application state over in-memory stores.
///
/// The ledger is returned separately so tests can open accounts on it.
pub fn create_test_state(config: Config) -> (AppState, Arc<InMemoryLedger>) {
    install_crypto_provider();

    let ledger = Arc::new(InMemoryLedger::new());
    let imagekit = Arc::new(ImageKitClient::new(config.imagekit.clone()).expect("Failed to create ImageKit client"));
    let payment_provider: Option<Arc<dyn PaymentProvider>> = config
        .payment
        .clone()
        .map(|payment| create_provider(payment).map(Arc::from).expect("Failed to create payment provider"));

    let state = AppState::builder()
        .config(config)
        .ledger(ledger.clone())
        .projects(Arc::new(InMemoryProjectStore::new()))
        .assets(imagekit.clone())
        .renderer(imagekit)
        .maybe_payment_provider(payment_provider)
        .build();

    (state, ledger)
}

/// Open an account for a fresh user with `credits`
pub fn create_test_user(ledger: &InMemoryLedger, credits: i64) -> CurrentUser {
    let id = Uuid::new_v4();
    let user = CurrentUser {
        id,
        email: format!("user-{}@example.com", id.simple()),
        name: "Test User".to_string(),
    };
    ledger.open_account(&UserCreateDBRequest {
        id,
        name: user.name.clone(),
        email: user.email.clone(),
        credits,
    });
    user
}

/// A valid session token for `user`, signed with the test secret
pub fn session_token(user: &CurrentUser, config: &Config) -> String {
    create_session_token(user, config, Duration::from_secs(3600)).expect("Failed to sign session token")
}

/// Standard Webhooks headers signing `body` with [`TEST_WEBHOOK_SECRET`]
pub fn webhook_headers(msg_id: &str, body: &[u8]) -> Vec<(String, String)> {
    let timestamp = chrono::Utc::now().timestamp();
    let signature = sign_payload(msg_id, timestamp, body, TEST_WEBHOOK_SECRET).expect("Failed to sign webhook");
    vec![
        ("webhook-id".to_string(), msg_id.to_string()),
        ("webhook-timestamp".to_string(), timestamp.to_string()),
        ("webhook-signature".to_string(), signature),
    ]
}

/// `Authorization` header pair for `user`
pub fn auth_header(user: &CurrentUser, config: &Config) -> (String, String) {
    ("authorization".to_string(), format!("Bearer {}", session_token(user, config)))
}
