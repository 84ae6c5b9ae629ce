//! # pixctl: control plane for an AI image studio
//!
//! `pixctl` is the backend behind the image studio dashboard. Users upload images straight to
//! the image CDN, apply AI transformations to them and pay for the expensive ones with credits
//! bought through a hosted checkout.
//!
//! ## Architecture
//!
//! - **Credits ledger** ([`ledger`]): non-negative balance per user with guarded debits and
//!   idempotent credits, recorded in an append-only transaction log
//! - **Fulfillment bridge** ([`payment_providers`], [`webhooks`]): verifies payment webhooks and
//!   credits each paid order exactly once
//! - **Projects** ([`projects`]): owner-scoped storage for uploaded images
//! - **Transformations** ([`transformations`]): debit, then apply, then render
//! - **Assets** ([`assets`]): ImageKit client for uploads, deletion and render URLs
//!
//! Every collaborator is constructed in [`Application::new`] and injected through [`AppState`]
//! as a trait object, so tests swap Postgres for the in-memory stores.
//!
//! ## Request Flow
//!
//! 1. **Authentication**: the [`CurrentUser`](api::models::users::CurrentUser) extractor verifies
//!    the session JWT from the `Authorization` header or the session cookie
//! 2. **Handler**: the route handler calls into the ledger, stores and providers
//! 3. **Errors**: every failure becomes a JSON body with a stable reason code
//!    (see [`errors::Error`])
//!
//! ## Getting Started
//!
//! ```no_run
//! use pixctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = pixctl::config::Args { config: "config.yaml".to_string(), validate: false };
//!     let config = Config::load(&args)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.unwrap() }).await
//! }
//! ```

pub mod api;
pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod metrics;
mod openapi;
pub mod payment_providers;
pub mod projects;
pub mod telemetry;
pub mod transformations;
pub mod types;
pub mod webhooks;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    assets::{AssetStore, ImageKitClient, Renderer},
    ledger::{CreditsLedger, PostgresLedger},
    openapi::ApiDoc,
    payment_providers::PaymentProvider,
    projects::{PostgresProjectStore, ProjectStore},
};
use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use config::{CorsOrigin, PoolSettings};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Cloned per request; every collaborator sits behind an `Arc`.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn CreditsLedger>,
    pub projects: Arc<dyn ProjectStore>,
    pub assets: Arc<dyn AssetStore>,
    pub renderer: Arc<dyn Renderer>,
    /// Checkout and webhook routes answer 501 when no provider is configured
    pub payment_provider: Option<Arc<dyn PaymentProvider>>,
}

/// Get the pixctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to Postgres with the configured pool settings
async fn connect_pool(url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    // 0 means the connection is never closed for that reason
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    Ok(options.connect(url).await?)
}

/// Setup the database connection pool and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    info!("Connecting to database");
    let pool = connect_pool(&config.database.url, &config.database.pool).await?;
    migrator().run(&pool).await?;
    Ok(pool)
}

/// Build the CORS layer.
///
/// Without configured origins, only the dashboard may call the API.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;
    let mut allow_credentials = cors_config.allow_credentials;

    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        if allow_credentials {
            tracing::warn!("CORS wildcard origin configured; credentials will not be allowed");
            allow_credentials = false;
        }
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        if origins.is_empty() {
            let dashboard = url::Url::parse(&config.dashboard_url)?;
            origins.push(dashboard.origin().ascii_serialization().parse::<HeaderValue>()?);
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/healthz` and the payment webhook at the root
/// - the user API under `/api/v1`
/// - OpenAPI docs at `/docs`
/// - Prometheus metrics at `/internal/metrics` when enabled
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{payments, projects, transformations, uploads, users};

    let api_routes = Router::new()
        // The caller's account
        .route("/users/me", get(users::get_current_user))
        .route("/users/me/credits", get(users::get_credits))
        .route("/users/me/credits/debits", post(users::debit_credits))
        .route("/users/me/transactions", get(users::list_transactions))
        // Projects
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route("/projects/{id}", get(projects::get_project).delete(projects::delete_project))
        // Transformations as project sub-resources
        .route(
            "/projects/{id}/transformations",
            get(transformations::list_transformations)
                .post(transformations::apply_transformation)
                .delete(transformations::clear_transformations),
        )
        .route(
            "/projects/{id}/transformations/{kind}",
            delete(transformations::remove_transformation),
        )
        // Direct uploads
        .route("/uploads/auth", get(uploads::get_upload_auth))
        // Checkout
        .route("/payments", post(payments::create_checkout))
        .route("/payments/portal", post(payments::create_portal_session))
        .route("/payments/{id}", patch(payments::confirm_checkout))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Webhook routes (external services, not part of client API docs)
        .route("/webhooks/payments", post(payments::webhook_handler))
        .with_state(state.clone())
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        // HTTP metrics from axum-prometheus followed by the domain counters
        router = router
            .route(
                "/internal/metrics",
                get(|| async move {
                    use prometheus::{Encoder, TextEncoder};

                    let mut output = metric_handle.render();

                    let mut buffer = vec![];
                    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
                        tracing::error!("Failed to encode domain metrics: {e}");
                    }
                    output.push_str(&String::from_utf8_lossy(&buffer));
                    output
                }),
            )
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service: database pool, collaborators and router.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting pixctl with configuration: {:#?}", config.redacted());

        let pool = setup_database(&config).await?;

        let imagekit = Arc::new(ImageKitClient::new(config.imagekit.clone())?);
        let payment_provider: Option<Arc<dyn PaymentProvider>> = match config.payment.clone() {
            Some(payment) => {
                let provider = payment_providers::create_provider(payment)?;
                info!("Payment provider: {}", provider.name());
                Some(Arc::from(provider))
            }
            None => {
                info!("No payment provider configured; checkout is disabled");
                None
            }
        };

        let app_state = AppState::builder()
            .config(config.clone())
            .ledger(Arc::new(PostgresLedger::new(pool.clone())))
            .projects(Arc::new(PostgresProjectStore::new(pool.clone())))
            .assets(imagekit.clone())
            .renderer(imagekit)
            .maybe_payment_provider(payment_provider)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "pixctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
