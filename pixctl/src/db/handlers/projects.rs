//! Database repository for projects and their transformation stacks.

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectTransformationRow},
    },
    types::{ProjectId, UserId, abbrev_uuid},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Primary key of `project_transformations`; one row per kind per project
pub const TRANSFORMATION_KIND_CONSTRAINT: &str = "project_transformations_kind_unique";

const PROJECT_COLUMNS: &str = "id, user_id, name, image_url, image_kit_id, file_path, created_at, updated_at";

/// Filter for listing projects
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    pub user_id: Option<UserId>,
    pub skip: i64,
    pub limit: i64,
}

impl ProjectFilter {
    pub fn new(user_id: Option<UserId>, skip: i64, limit: i64) -> Self {
        Self { user_id, skip, limit }
    }
}

pub struct Projects<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Projects<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch a project only if `owner` owns it
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&id)), err)]
    pub async fn get_owned(&mut self, owner: UserId, id: ProjectId) -> Result<Option<ProjectDBResponse>> {
        let project = sqlx::query_as::<_, ProjectDBResponse>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(project)
    }

    /// Delete a project only if `owner` owns it
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&owner), project_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_owned(&mut self, owner: UserId, id: ProjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_for_user(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Applied transformations in application order
    pub async fn list_transformations(&mut self, project_id: ProjectId) -> Result<Vec<ProjectTransformationRow>> {
        let rows = sqlx::query_as::<_, ProjectTransformationRow>(
            "SELECT kind, label, position, applied_at FROM project_transformations WHERE project_id = $1 ORDER BY position, applied_at",
        )
        .bind(project_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    /// Append a transformation to the end of the stack.
    ///
    /// Fails with a unique violation on [`TRANSFORMATION_KIND_CONSTRAINT`] if the kind is
    /// already applied.
    #[instrument(skip(self, label), fields(project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn push_transformation(
        &mut self,
        project_id: ProjectId,
        kind: &str,
        label: Option<&str>,
    ) -> Result<ProjectTransformationRow> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ProjectTransformationRow>(
            r#"
            INSERT INTO project_transformations (project_id, kind, label, position)
            SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0)
            FROM project_transformations
            WHERE project_id = $1
            RETURNING kind, label, position, applied_at
            "#,
        )
        .bind(project_id)
        .bind(kind)
        .bind(label)
        .fetch_one(&mut *tx)
        .await?;

        Self::touch(&mut tx, project_id).await?;
        tx.commit().await?;

        Ok(row)
    }

    /// Remove one kind from the stack; later transformations keep their relative order
    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn remove_transformation(&mut self, project_id: ProjectId, kind: &str) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM project_transformations WHERE project_id = $1 AND kind = $2")
            .bind(project_id)
            .bind(kind)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() > 0 {
            Self::touch(&mut tx, project_id).await?;
        }
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every transformation, returning how many were removed
    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn clear_transformations(&mut self, project_id: ProjectId) -> Result<u64> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM project_transformations WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        Self::touch(&mut tx, project_id).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn touch(conn: &mut PgConnection, project_id: ProjectId) -> Result<()> {
        sqlx::query("UPDATE projects SET updated_at = NOW() WHERE id = $1")
            .bind(project_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Projects<'c> {
    type CreateRequest = ProjectCreateDBRequest;
    type Response = ProjectDBResponse;
    type Id = ProjectId;
    type Filter = ProjectFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let project = sqlx::query_as::<_, ProjectDBResponse>(&format!(
            r#"
            INSERT INTO projects (id, user_id, name, image_url, image_kit_id, file_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.image_url)
        .bind(&request.image_kit_id)
        .bind(&request.file_path)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(project)
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let project = sqlx::query_as::<_, ProjectDBResponse>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(project)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let projects = sqlx::query_as::<_, ProjectDBResponse>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM projects
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            OFFSET $2 LIMIT $3
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(projects)
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
