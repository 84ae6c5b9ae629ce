//! Project store.
//!
//! A project is one uploaded image plus the transformations applied to it. Every operation is
//! scoped to the owning user: a project that exists but belongs to someone else is reported
//! exactly like a missing one ([`ProjectError::NotFoundOrForbidden`]).

mod in_memory;
mod postgres;

pub use in_memory::InMemoryProjectStore;
pub use postgres::PostgresProjectStore;

use crate::{
    assets::AssetStore,
    db::{
        errors::DbError,
        models::projects::{ProjectCreateDBRequest, ProjectDBResponse},
    },
    transformations::{Transformation, TransformationKind},
    types::{ProjectId, UserId, abbrev_uuid},
};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Name given to projects created without one
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project not found")]
    NotFoundOrForbidden,

    #[error("{0} is already applied to this project")]
    AlreadyApplied(TransformationKind),

    #[error(transparent)]
    Database(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// A page of a user's projects, newest first
#[derive(Debug, Clone)]
pub struct ProjectPage {
    pub projects: Vec<ProjectDBResponse>,
    pub total_count: i64,
}

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create(&self, request: &ProjectCreateDBRequest) -> Result<ProjectDBResponse>;

    async fn list(&self, owner: UserId, skip: i64, limit: i64) -> Result<ProjectPage>;

    /// The project, if `owner` owns it
    async fn get(&self, owner: UserId, id: ProjectId) -> Result<ProjectDBResponse>;

    /// Delete the project and its transformations, if `owner` owns it
    async fn delete(&self, owner: UserId, id: ProjectId) -> Result<()>;

    /// Applied transformations in application order
    async fn transformations(&self, id: ProjectId) -> Result<Vec<Transformation>>;

    /// Append a transformation, failing with [`ProjectError::AlreadyApplied`] if its kind is
    /// present. Returns the updated list.
    async fn push_transformation(&self, id: ProjectId, transformation: &Transformation) -> Result<Vec<Transformation>>;

    /// Remove one kind; returns false if it was not applied
    async fn remove_transformation(&self, id: ProjectId, kind: TransformationKind) -> Result<bool>;

    /// Remove every transformation; returns how many were removed
    async fn clear_transformations(&self, id: ProjectId) -> Result<u64>;
}

/// Delete a project owned by `owner`, then its remote asset.
///
/// Asset deletion is best-effort: a CDN failure is logged and the project row is still removed.
#[instrument(skip(store, assets), fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&id)), err)]
pub async fn delete_project(
    store: &dyn ProjectStore,
    assets: &dyn AssetStore,
    owner: UserId,
    id: ProjectId,
) -> Result<ProjectDBResponse> {
    let project = store.get(owner, id).await?;

    if let Err(e) = assets.delete_asset(&project.image_kit_id).await {
        warn!(image_kit_id = %project.image_kit_id, "Failed to delete remote asset: {e}");
    }

    store.delete(owner, id).await?;
    info!("Deleted project");

    Ok(project)
}
