//! In-memory project store.

use super::{ProjectError, ProjectPage, ProjectStore, Result};
use crate::{
    db::models::projects::{ProjectCreateDBRequest, ProjectDBResponse},
    transformations::{Transformation, TransformationKind},
    types::{ProjectId, UserId},
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

struct StoredProject {
    project: ProjectDBResponse,
    transformations: Vec<Transformation>,
}

#[derive(Clone, Default)]
pub struct InMemoryProjectStore {
    projects: Arc<DashMap<ProjectId, StoredProject>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create(&self, request: &ProjectCreateDBRequest) -> Result<ProjectDBResponse> {
        let now = Utc::now();
        let project = ProjectDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            name: request.name.clone(),
            image_url: request.image_url.clone(),
            image_kit_id: request.image_kit_id.clone(),
            file_path: request.file_path.clone(),
            created_at: now,
            updated_at: now,
        };
        self.projects.insert(
            project.id,
            StoredProject {
                project: project.clone(),
                transformations: Vec::new(),
            },
        );
        Ok(project)
    }

    async fn list(&self, owner: UserId, skip: i64, limit: i64) -> Result<ProjectPage> {
        let mut owned: Vec<ProjectDBResponse> = self
            .projects
            .iter()
            .filter(|entry| entry.project.user_id == owner)
            .map(|entry| entry.project.clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total_count = owned.len() as i64;
        let projects = owned
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok(ProjectPage { projects, total_count })
    }

    async fn get(&self, owner: UserId, id: ProjectId) -> Result<ProjectDBResponse> {
        self.projects
            .get(&id)
            .filter(|entry| entry.project.user_id == owner)
            .map(|entry| entry.project.clone())
            .ok_or(ProjectError::NotFoundOrForbidden)
    }

    async fn delete(&self, owner: UserId, id: ProjectId) -> Result<()> {
        self.projects
            .remove_if(&id, |_, stored| stored.project.user_id == owner)
            .map(|_| ())
            .ok_or(ProjectError::NotFoundOrForbidden)
    }

    async fn transformations(&self, id: ProjectId) -> Result<Vec<Transformation>> {
        self.projects
            .get(&id)
            .map(|entry| entry.transformations.clone())
            .ok_or(ProjectError::NotFoundOrForbidden)
    }

    async fn push_transformation(&self, id: ProjectId, transformation: &Transformation) -> Result<Vec<Transformation>> {
        let mut stored = self.projects.get_mut(&id).ok_or(ProjectError::NotFoundOrForbidden)?;

        let kind = transformation.kind();
        if stored.transformations.iter().any(|t| t.kind() == kind) {
            return Err(ProjectError::AlreadyApplied(kind));
        }
        stored.transformations.push(transformation.clone());
        stored.project.updated_at = Utc::now();

        Ok(stored.transformations.clone())
    }

    async fn remove_transformation(&self, id: ProjectId, kind: TransformationKind) -> Result<bool> {
        let mut stored = self.projects.get_mut(&id).ok_or(ProjectError::NotFoundOrForbidden)?;

        let before = stored.transformations.len();
        stored.transformations.retain(|t| t.kind() != kind);
        let removed = stored.transformations.len() != before;
        if removed {
            stored.project.updated_at = Utc::now();
        }

        Ok(removed)
    }

    async fn clear_transformations(&self, id: ProjectId) -> Result<u64> {
        let mut stored = self.projects.get_mut(&id).ok_or(ProjectError::NotFoundOrForbidden)?;

        let removed = stored.transformations.len() as u64;
        stored.transformations.clear();
        stored.project.updated_at = Utc::now();

        Ok(removed)
    }
}
