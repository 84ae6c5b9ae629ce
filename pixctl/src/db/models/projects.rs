//! Database models for projects and their applied transformations.

use crate::types::{ProjectId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new project
#[derive(Debug, Clone)]
pub struct ProjectCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub image_url: String,
    pub image_kit_id: String,
    pub file_path: String,
}

/// Database response for a project
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProjectDBResponse {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub image_url: String,
    pub image_kit_id: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of `project_transformations`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectTransformationRow {
    pub kind: String,
    pub label: Option<String>,
    pub position: i32,
    pub applied_at: DateTime<Utc>,
}
