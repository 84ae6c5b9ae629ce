//! API response models for project transformations.
//!
//! Requests use [`Transformation`] directly: `{"kind": "upscale"}` or
//! `{"kind": "object_crop", "label": "dog"}`.

use crate::{
    transformations::{ApplyOutcome, Transformation, orchestrator::TransformationView},
    types::ProjectId,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplyTransformationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub project_id: ProjectId,
    pub transformations: Vec<Transformation>,
    pub credits_charged: i64,
    /// Balance after the debit, omitted for free transformations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<i64>,
    /// Render URL; null when the render request failed
    pub rendered_url: Option<String>,
}

impl From<ApplyOutcome> for ApplyTransformationResponse {
    fn from(outcome: ApplyOutcome) -> Self {
        Self {
            project_id: outcome.project.id,
            transformations: outcome.transformations,
            credits_charged: outcome.credits_charged,
            remaining_credits: outcome.remaining_credits,
            rendered_url: outcome.rendered_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransformationListResponse {
    #[schema(value_type = String, format = "uuid")]
    pub project_id: ProjectId,
    pub transformations: Vec<Transformation>,
    /// URL of the image with every listed transformation applied
    pub preview_url: String,
}

impl From<TransformationView> for TransformationListResponse {
    fn from(view: TransformationView) -> Self {
        Self {
            project_id: view.project.id,
            transformations: view.transformations,
            preview_url: view.preview_url,
        }
    }
}
