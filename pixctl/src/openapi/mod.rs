//! OpenAPI documentation for the user API at `/api/v1/*`, served by Scalar at `/docs`.
//!
//! The payment webhook is called by the provider, not by clients, and is left out.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    api::{self, models},
    assets::UploadAuth,
    db::models::credits::CreditTransactionType,
    errors::ErrorBody,
    transformations::{Transformation, TransformationKind},
};

/// Session security schemes: the identity provider's JWT as a bearer token or a cookie.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token issued at sign-in. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_SESSION_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "pixctl_session",
                    "Session cookie set by the dashboard. The cookie name is configurable.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pixctl API",
        description = "Credits, projects, transformations and checkout for the image studio dashboard."
    ),
    servers(
        (url = "/api/v1", description = "User API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::users::get_current_user,
        api::handlers::users::get_credits,
        api::handlers::users::debit_credits,
        api::handlers::users::list_transactions,
        api::handlers::projects::list_projects,
        api::handlers::projects::create_project,
        api::handlers::projects::get_project,
        api::handlers::projects::delete_project,
        api::handlers::transformations::list_transformations,
        api::handlers::transformations::apply_transformation,
        api::handlers::transformations::clear_transformations,
        api::handlers::transformations::remove_transformation,
        api::handlers::uploads::get_upload_auth,
        api::handlers::payments::create_checkout,
        api::handlers::payments::create_portal_session,
        api::handlers::payments::confirm_checkout,
    ),
    components(
        schemas(
            ErrorBody,
            models::users::UserResponse,
            models::users::CreditsResponse,
            models::users::DebitRequest,
            models::transactions::CreditTransactionResponse,
            models::transactions::DebitResponse,
            CreditTransactionType,
            models::projects::ProjectCreate,
            models::projects::ProjectResponse,
            models::transformations::ApplyTransformationResponse,
            models::transformations::TransformationListResponse,
            Transformation,
            TransformationKind,
            UploadAuth,
            models::payments::CheckoutRequest,
            models::payments::RedirectResponse,
            models::payments::FulfillmentStatus,
            models::payments::FulfillmentResponse,
        )
    ),
    tags(
        (name = "users", description = "The signed-in user's account and credits"),
        (name = "projects", description = "Uploaded images"),
        (name = "transformations", description = "AI transformations applied to a project"),
        (name = "uploads", description = "Direct upload authentication"),
        (name = "payments", description = "Credit pack checkout"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_user_api() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_value(&spec).unwrap();

        let paths = json["paths"].as_object().unwrap();
        for path in [
            "/users/me",
            "/users/me/credits/debits",
            "/projects/{id}/transformations",
            "/projects/{id}/transformations/{kind}",
            "/payments/{id}",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(!paths.contains_key("/webhooks/payments"));

        let schemes = json["components"]["securitySchemes"].as_object().unwrap();
        assert!(schemes.contains_key("BearerAuth"));
        assert!(schemes.contains_key("CookieAuth"));
    }
}
