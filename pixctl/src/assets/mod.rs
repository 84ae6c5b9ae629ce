//! Image asset service.
//!
//! Uploaded images live in ImageKit. The backend never handles image bytes itself; it only:
//!
//! - signs client-side uploads ([`AssetStore::upload_auth`]),
//! - deletes files when their project is deleted ([`AssetStore::delete_asset`]),
//! - builds transformation URLs and asks the CDN to start rendering them ([`Renderer`]).
//!
//! Both traits are implemented by [`ImageKitClient`] and injected through the application state.

mod imagekit;
mod upload;

pub use imagekit::ImageKitClient;
pub use upload::{UploadAuth, upload_signature};

use crate::{db::models::projects::ProjectDBResponse, transformations::Transformation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Image API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Image API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to sign upload")]
    Signing,

    #[error("Invalid image API URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render of {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("Render request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    /// Delete a stored file by its asset id
    async fn delete_asset(&self, asset_id: &str) -> Result<(), AssetError>;

    /// Parameters a browser needs to upload directly to the asset store
    fn upload_auth(&self) -> Result<UploadAuth, AssetError>;
}

#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// URL of the project's image with `transformations` applied, without contacting the CDN
    fn preview_url(&self, project: &ProjectDBResponse, transformations: &[Transformation]) -> String;

    /// Request a render and return its URL
    async fn render(&self, project: &ProjectDBResponse, transformations: &[Transformation]) -> Result<String, RenderError>;
}
