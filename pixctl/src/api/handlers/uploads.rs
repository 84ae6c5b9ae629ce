//! HTTP handler for direct upload authentication.

use crate::{AppState, api::models::users::CurrentUser, assets::UploadAuth, errors::Result};
use axum::{extract::State, response::Json};

/// Sign a direct upload
#[utoipa::path(
    get,
    path = "/uploads/auth",
    tag = "uploads",
    summary = "Get upload authentication",
    description = "One-time parameters for uploading an image from the browser straight to ImageKit. \
    The signature expires after the configured TTL (30 minutes by default).",
    responses(
        (status = 200, description = "Upload parameters", body = UploadAuth),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn get_upload_auth(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UploadAuth>> {
    Ok(Json(state.assets.upload_auth()?))
}
