//! HTTP handlers for project endpoints.
//!
//! Projects are only ever visible to their owner; another user's project answers exactly like a
//! missing one.

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        projects::{ProjectCreate, ProjectResponse},
        users::CurrentUser,
    },
    errors::Result,
    projects,
    types::ProjectId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// List the current user's projects
#[utoipa::path(
    get,
    path = "/projects",
    tag = "projects",
    summary = "List projects",
    description = "Projects of the signed-in user, newest first",
    params(Pagination),
    responses(
        (status = 200, description = "Page of projects", body = PaginatedResponse<ProjectResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_projects(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<ProjectResponse>>> {
    let (skip, limit) = pagination.params();
    let page = state.projects.list(current_user.id, skip, limit).await?;

    let data = page.projects.into_iter().map(ProjectResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, page.total_count, &pagination)))
}

/// Create a project from a completed upload
#[utoipa::path(
    post,
    path = "/projects",
    tag = "projects",
    summary = "Create project",
    description = "Record an image the browser uploaded to ImageKit. The name defaults to `Untitled Project`.",
    request_body = ProjectCreate,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "A required field is empty", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn create_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(data): Json<ProjectCreate>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    let request = data.into_db_request(current_user.id)?;
    let project = state.projects.create(&request).await?;
    tracing::info!(project_id = %project.id, "Created project");

    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// Get a project
#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "projects",
    summary = "Get project",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    current_user: CurrentUser,
) -> Result<Json<ProjectResponse>> {
    let project = state.projects.get(current_user.id, id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

/// Delete a project
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "projects",
    summary = "Delete project",
    description = "Delete the project and its transformations. The stored image is removed from ImageKit on a \
    best-effort basis.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Project not found or not owned by the caller", body = crate::errors::ErrorBody),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    projects::delete_project(state.projects.as_ref(), state.assets.as_ref(), current_user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
