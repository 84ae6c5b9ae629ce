//! PostgreSQL-backed project store.

use super::{ProjectError, ProjectPage, ProjectStore, Result};
use crate::{
    db::{
        errors::DbError,
        handlers::{
            Projects, Repository,
            projects::{ProjectFilter, TRANSFORMATION_KIND_CONSTRAINT},
        },
        models::projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectTransformationRow},
    },
    transformations::{Transformation, TransformationKind},
    types::{ProjectId, UserId},
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PostgresProjectStore {
    pool: PgPool,
}

impl PostgresProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_transformations(rows: Vec<ProjectTransformationRow>) -> Result<Vec<Transformation>> {
    rows.into_iter()
        .map(|row| {
            Transformation::from_stored(&row.kind, row.label)
                .map_err(|e| ProjectError::Database(DbError::Other(anyhow::anyhow!("corrupt transformation row: {e}"))))
        })
        .collect()
}

#[async_trait::async_trait]
impl ProjectStore for PostgresProjectStore {
    async fn create(&self, request: &ProjectCreateDBRequest) -> Result<ProjectDBResponse> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(Projects::new(&mut conn).create(request).await?)
    }

    async fn list(&self, owner: UserId, skip: i64, limit: i64) -> Result<ProjectPage> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let mut repo = Projects::new(&mut conn);
        let projects = repo.list(&ProjectFilter::new(Some(owner), skip, limit)).await?;
        let total_count = repo.count_for_user(owner).await?;

        Ok(ProjectPage { projects, total_count })
    }

    async fn get(&self, owner: UserId, id: ProjectId) -> Result<ProjectDBResponse> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Projects::new(&mut conn)
            .get_owned(owner, id)
            .await?
            .ok_or(ProjectError::NotFoundOrForbidden)
    }

    async fn delete(&self, owner: UserId, id: ProjectId) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        if Projects::new(&mut conn).delete_owned(owner, id).await? {
            Ok(())
        } else {
            Err(ProjectError::NotFoundOrForbidden)
        }
    }

    async fn transformations(&self, id: ProjectId) -> Result<Vec<Transformation>> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let rows = Projects::new(&mut conn).list_transformations(id).await?;
        into_transformations(rows)
    }

    async fn push_transformation(&self, id: ProjectId, transformation: &Transformation) -> Result<Vec<Transformation>> {
        let kind = transformation.kind();
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let mut repo = Projects::new(&mut conn);

        match repo.push_transformation(id, kind.as_str(), transformation.label()).await {
            Ok(_) => {}
            Err(e) if e.is_unique_violation_of(TRANSFORMATION_KIND_CONSTRAINT) => {
                return Err(ProjectError::AlreadyApplied(kind));
            }
            Err(DbError::ForeignKeyViolation { .. }) => return Err(ProjectError::NotFoundOrForbidden),
            Err(e) => return Err(e.into()),
        }

        into_transformations(repo.list_transformations(id).await?)
    }

    async fn remove_transformation(&self, id: ProjectId, kind: TransformationKind) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(Projects::new(&mut conn).remove_transformation(id, kind.as_str()).await?)
    }

    async fn clear_transformations(&self, id: ProjectId) -> Result<u64> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(Projects::new(&mut conn).clear_transformations(id).await?)
    }
}
