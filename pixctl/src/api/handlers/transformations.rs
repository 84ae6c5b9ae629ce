//! HTTP handlers for a project's transformations.

use crate::{
    AppState,
    api::models::{
        transformations::{ApplyTransformationResponse, TransformationListResponse},
        users::CurrentUser,
    },
    errors::Result,
    transformations::{Transformation, TransformationKind, TransformationOrchestrator},
    types::ProjectId,
};
use axum::{
    extract::{Path, State},
    response::Json,
};

fn orchestrator(state: &AppState) -> TransformationOrchestrator<'_> {
    TransformationOrchestrator::new(
        state.ledger.as_ref(),
        state.projects.as_ref(),
        state.renderer.as_ref(),
        &state.config.credits.costs,
    )
}

/// List a project's transformations
#[utoipa::path(
    get,
    path = "/projects/{id}/transformations",
    tag = "transformations",
    summary = "List transformations",
    description = "Applied transformations in order, with the URL that renders them",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Transformation list", body = TransformationListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_transformations(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    current_user: CurrentUser,
) -> Result<Json<TransformationListResponse>> {
    let view = orchestrator(&state).list(current_user.id, id).await?;
    Ok(Json(TransformationListResponse::from(view)))
}

/// Apply a transformation
#[utoipa::path(
    post,
    path = "/projects/{id}/transformations",
    tag = "transformations",
    summary = "Apply transformation",
    description = "Background removal and upscaling are paid: the credits are debited before the transformation \
    is recorded. Object crop is free and takes a label such as `dog`. Each kind can be applied once per project.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
    ),
    request_body = Transformation,
    responses(
        (status = 200, description = "Transformation applied", body = ApplyTransformationResponse),
        (status = 400, description = "Empty or invalid object crop label", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 402, description = "Insufficient credits", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
        (status = 409, description = "This kind is already applied", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id, project_id = %id))]
pub async fn apply_transformation(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    current_user: CurrentUser,
    Json(transformation): Json<Transformation>,
) -> Result<Json<ApplyTransformationResponse>> {
    let outcome = orchestrator(&state).apply(current_user.id, id, transformation).await?;
    Ok(Json(ApplyTransformationResponse::from(outcome)))
}

/// Remove every transformation
#[utoipa::path(
    delete,
    path = "/projects/{id}/transformations",
    tag = "transformations",
    summary = "Clear transformations",
    description = "Reset the project to the original image. Credits are not returned.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Transformations cleared", body = TransformationListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn clear_transformations(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    current_user: CurrentUser,
) -> Result<Json<TransformationListResponse>> {
    let view = orchestrator(&state).clear(current_user.id, id).await?;
    Ok(Json(TransformationListResponse::from(view)))
}

/// Remove one transformation
#[utoipa::path(
    delete,
    path = "/projects/{id}/transformations/{kind}",
    tag = "transformations",
    summary = "Remove transformation",
    description = "Remove one kind from the list. Removing a kind that is not applied is a no-op. Credits are not returned.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
        ("kind" = TransformationKind, Path, description = "Transformation kind"),
    ),
    responses(
        (status = 200, description = "Transformation removed", body = TransformationListResponse),
        (status = 400, description = "Unknown kind", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn remove_transformation(
    State(state): State<AppState>,
    Path((id, kind)): Path<(ProjectId, String)>,
    current_user: CurrentUser,
) -> Result<Json<TransformationListResponse>> {
    let kind: TransformationKind = kind.parse()?;
    let view = orchestrator(&state).remove(current_user.id, id, kind).await?;
    Ok(Json(TransformationListResponse::from(view)))
}
