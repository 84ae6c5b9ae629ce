//! Client-side upload authentication.
//!
//! ImageKit accepts uploads straight from the browser when the request carries a one-time
//! `token`, an `expire` unix timestamp and `signature = hex(HMAC-SHA1(private_key, token + expire))`.

use super::AssetError;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use utoipa::ToSchema;

type HmacSha1 = Hmac<Sha1>;

/// Parameters for one direct upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuth {
    pub token: String,
    /// Unix timestamp (seconds) after which the signature is rejected
    pub expire: i64,
    pub signature: String,
    pub public_key: String,
    pub url_endpoint: String,
}

/// Compute the upload signature for `token` and `expire`
pub fn upload_signature(private_key: &str, token: &str, expire: i64) -> Result<String, AssetError> {
    let mut mac = HmacSha1::new_from_slice(private_key.as_bytes()).map_err(|_| AssetError::Signing)?;
    mac.update(token.as_bytes());
    mac.update(expire.to_string().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
