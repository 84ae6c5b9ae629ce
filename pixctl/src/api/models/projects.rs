//! API request/response models for projects.

use crate::{
    db::models::projects::{ProjectCreateDBRequest, ProjectDBResponse},
    errors::Error,
    projects::DEFAULT_PROJECT_NAME,
    types::{ProjectId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Register an uploaded image as a project
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProjectCreate {
    /// Public URL of the uploaded image
    pub image_url: String,
    /// Asset id returned by the upload
    pub image_kit_id: String,
    /// Path of the image inside the URL endpoint
    pub file_path: String,
    /// Defaults to "Untitled Project"
    pub name: Option<String>,
}

impl ProjectCreate {
    /// Validate and build the insert for `owner`
    pub fn into_db_request(self, owner: UserId) -> Result<ProjectCreateDBRequest, Error> {
        for (field, value) in [
            ("image_url", &self.image_url),
            ("image_kit_id", &self.image_kit_id),
            ("file_path", &self.file_path),
        ] {
            if value.trim().is_empty() {
                return Err(Error::BadRequest {
                    message: format!("{field} must not be empty"),
                });
            }
        }

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());

        Ok(ProjectCreateDBRequest {
            user_id: owner,
            name,
            image_url: self.image_url,
            image_kit_id: self.image_kit_id,
            file_path: self.file_path,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProjectId,
    pub name: String,
    pub image_url: String,
    pub image_kit_id: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectDBResponse> for ProjectResponse {
    fn from(db: ProjectDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            image_url: db.image_url,
            image_kit_id: db.image_kit_id,
            file_path: db.file_path,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
