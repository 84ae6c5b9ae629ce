//! AI transformations applied to a project's image.
//!
//! A project carries an ordered list of [`Transformation`]s with at most one instance of each
//! [`TransformationKind`]. Each transformation maps to one ImageKit chain step; the render URL
//! is the project's image with the steps joined into a `tr` query parameter.
//!
//! Paid kinds debit the credits ledger before they are recorded. See [`orchestrator`].

pub mod orchestrator;

pub use orchestrator::{ApplyOutcome, TransformationOrchestrator};

use crate::{db::errors::DbError, ledger::LedgerError, projects::ProjectError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    RemoveBackground,
    Upscale,
    ObjectCrop,
}

impl TransformationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoveBackground => "remove_background",
            Self::Upscale => "upscale",
            Self::ObjectCrop => "object_crop",
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationKind {
    type Err = TransformationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remove_background" => Ok(Self::RemoveBackground),
            "upscale" => Ok(Self::Upscale),
            "object_crop" => Ok(Self::ObjectCrop),
            other => Err(TransformationError::UnknownKind(other.to_string())),
        }
    }
}

/// One applied transformation.
///
/// Serialized with an internal `kind` tag, e.g. `{"kind": "object_crop", "label": "dog"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    /// AI background removal
    RemoveBackground,
    /// AI upscaling
    Upscale,
    /// Square crop focused on the object matching `label`
    ObjectCrop { label: String },
}

impl Transformation {
    pub fn kind(&self) -> TransformationKind {
        match self {
            Self::RemoveBackground => TransformationKind::RemoveBackground,
            Self::Upscale => TransformationKind::Upscale,
            Self::ObjectCrop { .. } => TransformationKind::ObjectCrop,
        }
    }

    /// Build an object crop from user input
    pub fn object_crop(label: &str) -> Result<Self, TransformationError> {
        Ok(Self::ObjectCrop {
            label: normalize_label(label)?,
        })
    }

    /// Validate user input, normalizing the crop label
    pub fn normalized(self) -> Result<Self, TransformationError> {
        match self {
            Self::ObjectCrop { label } => Self::object_crop(&label),
            other => Ok(other),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::ObjectCrop { label } => Some(label.as_str()),
            _ => None,
        }
    }

    /// Rebuild a transformation from its stored kind and label
    pub fn from_stored(kind: &str, label: Option<String>) -> Result<Self, TransformationError> {
        match (kind.parse::<TransformationKind>()?, label) {
            (TransformationKind::RemoveBackground, _) => Ok(Self::RemoveBackground),
            (TransformationKind::Upscale, _) => Ok(Self::Upscale),
            (TransformationKind::ObjectCrop, Some(label)) => Ok(Self::ObjectCrop { label }),
            (TransformationKind::ObjectCrop, None) => Err(TransformationError::EmptyInput),
        }
    }

    /// The ImageKit chain step for this transformation
    pub fn imagekit_step(&self) -> String {
        match self {
            Self::RemoveBackground => "e-bgremove".to_string(),
            Self::Upscale => "e-upscale".to_string(),
            Self::ObjectCrop { label } => format!("fo-{label},ar-1-1"),
        }
    }
}

/// Join the chain steps of `transformations` in order, `None` if there are none
pub fn render_chain(transformations: &[Transformation]) -> Option<String> {
    if transformations.is_empty() {
        return None;
    }
    Some(
        transformations
            .iter()
            .map(Transformation::imagekit_step)
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// Trim and lowercase a crop label.
///
/// Labels end up inside an ImageKit transformation string, so only `[a-z0-9_-]` is allowed.
pub fn normalize_label(raw: &str) -> Result<String, TransformationError> {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return Err(TransformationError::EmptyInput);
    }
    if !label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return Err(TransformationError::InvalidLabel(label));
    }
    Ok(label)
}

#[derive(Debug, Error)]
pub enum TransformationError {
    /// Crop label was empty or whitespace
    #[error("Label must not be empty")]
    EmptyInput,

    #[error("Label '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidLabel(String),

    #[error("Unknown transformation kind '{0}'")]
    UnknownKind(String),

    #[error("{0} is already applied to this project")]
    AlreadyApplied(TransformationKind),

    #[error("Project not found")]
    NotFoundOrForbidden,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<ProjectError> for TransformationError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFoundOrForbidden => Self::NotFoundOrForbidden,
            ProjectError::AlreadyApplied(kind) => Self::AlreadyApplied(kind),
            ProjectError::Database(e) => Self::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_normalization() {
        assert_eq!(normalize_label("  Dog ").unwrap(), "dog");
        assert_eq!(normalize_label("TRAFFIC_light").unwrap(), "traffic_light");
        assert!(matches!(normalize_label(""), Err(TransformationError::EmptyInput)));
        assert!(matches!(normalize_label(" \t\n"), Err(TransformationError::EmptyInput)));
        assert!(matches!(normalize_label("dog,w-10"), Err(TransformationError::InvalidLabel(_))));
        assert!(matches!(normalize_label("a b"), Err(TransformationError::InvalidLabel(_))));
    }

    #[test]
    fn test_imagekit_steps() {
        assert_eq!(Transformation::RemoveBackground.imagekit_step(), "e-bgremove");
        assert_eq!(Transformation::Upscale.imagekit_step(), "e-upscale");
        assert_eq!(Transformation::object_crop(" Cat ").unwrap().imagekit_step(), "fo-cat,ar-1-1");
    }

    #[test]
    fn test_render_chain_keeps_order() {
        assert_eq!(render_chain(&[]), None);
        let chain = render_chain(&[
            Transformation::RemoveBackground,
            Transformation::object_crop("dog").unwrap(),
            Transformation::Upscale,
        ]);
        assert_eq!(chain.as_deref(), Some("e-bgremove:fo-dog,ar-1-1:e-upscale"));
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(Transformation::object_crop("dog").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "object_crop", "label": "dog"}));

        let parsed: Transformation = serde_json::from_value(serde_json::json!({"kind": "remove_background"})).unwrap();
        assert_eq!(parsed, Transformation::RemoveBackground);

        assert!(serde_json::from_value::<Transformation>(serde_json::json!({"kind": "sharpen"})).is_err());
    }

    #[test]
    fn test_from_stored() {
        assert_eq!(
            Transformation::from_stored("object_crop", Some("dog".to_string())).unwrap(),
            Transformation::ObjectCrop { label: "dog".to_string() }
        );
        assert_eq!(Transformation::from_stored("upscale", None).unwrap(), Transformation::Upscale);
        assert!(Transformation::from_stored("object_crop", None).is_err());
        assert!(matches!(
            Transformation::from_stored("sepia", None),
            Err(TransformationError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [TransformationKind::RemoveBackground, TransformationKind::Upscale, TransformationKind::ObjectCrop] {
            assert_eq!(kind.as_str().parse::<TransformationKind>().unwrap(), kind);
            assert_eq!(Transformation::from_stored(kind.as_str(), Some("x".to_string())).unwrap().kind(), kind);
        }
    }
}
