//! ImageKit API client.

use super::{AssetError, AssetStore, RenderError, Renderer, UploadAuth, upload_signature};
use crate::{
    config::ImageKitConfig,
    db::models::projects::ProjectDBResponse,
    transformations::{Transformation, render_chain},
};
use chrono::Utc;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

#[derive(Clone)]
pub struct ImageKitClient {
    http_client: reqwest::Client,
    config: ImageKitConfig,
}

impl ImageKitClient {
    pub fn new(config: ImageKitConfig) -> Result<Self, AssetError> {
        let http_client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http_client, config })
    }

    /// Management API URL of one file; the id is a single escaped path segment
    fn file_url(&self, asset_id: &str) -> Result<Url, AssetError> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| AssetError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AssetError::InvalidUrl(self.config.api_base_url.clone()))?
            .pop_if_empty()
            .extend(["v1", "files", asset_id]);
        Ok(url)
    }

    /// `{url_endpoint}/{file_path}` with an optional `tr` chain
    fn image_url(&self, file_path: &str, chain: Option<&str>) -> String {
        let base = format!(
            "{}/{}",
            self.config.url_endpoint.trim_end_matches('/'),
            file_path.trim_start_matches('/')
        );
        match chain {
            Some(chain) => format!("{base}?tr={chain}"),
            None => base,
        }
    }
}

#[async_trait::async_trait]
impl AssetStore for ImageKitClient {
    #[instrument(skip(self), err)]
    async fn delete_asset(&self, asset_id: &str) -> Result<(), AssetError> {
        let url = self.file_url(asset_id)?;

        let response = self
            .http_client
            .delete(url)
            .basic_auth(&self.config.private_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Deleted asset");
        Ok(())
    }

    fn upload_auth(&self) -> Result<UploadAuth, AssetError> {
        let token = Uuid::new_v4().to_string();
        let expire = Utc::now().timestamp() + self.config.upload_token_ttl.as_secs() as i64;
        let signature = upload_signature(&self.config.private_key, &token, expire)?;

        Ok(UploadAuth {
            token,
            expire,
            signature,
            public_key: self.config.public_key.clone(),
            url_endpoint: self.config.url_endpoint.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Renderer for ImageKitClient {
    fn preview_url(&self, project: &ProjectDBResponse, transformations: &[Transformation]) -> String {
        self.image_url(&project.file_path, render_chain(transformations).as_deref())
    }

    #[instrument(skip_all, fields(project_id = %project.id), err)]
    async fn render(&self, project: &ProjectDBResponse, transformations: &[Transformation]) -> Result<String, RenderError> {
        let url = self.preview_url(project, transformations);
        if !self.config.prefetch_renders {
            return Ok(url);
        }

        // ImageKit renders on first fetch; prefetching surfaces failures before the user sees them
        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url,
                status: status.as_u16(),
            });
        }

        debug!(%url, "Render prefetched");
        Ok(url)
    }
}
