//! HMAC-SHA256 verification for Standard Webhooks.
//!
//! - Signature is computed over: `{msg_id}.{timestamp}.{payload}`
//! - The signature is base64-encoded HMAC-SHA256, sent as `v1,{signature}`
//! - Headers: `webhook-id`, `webhook-timestamp`, `webhook-signature`
//!
//! See: <https://www.standardwebhooks.com/>

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for base64-encoded webhook secrets
pub const SECRET_PREFIX: &str = "whsec_";

/// Maximum distance between `webhook-timestamp` and now, in seconds
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

pub const HEADER_ID: &str = "webhook-id";
pub const HEADER_TIMESTAMP: &str = "webhook-timestamp";
pub const HEADER_SIGNATURE: &str = "webhook-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing or unreadable {0} header")]
    MissingHeader(&'static str),

    #[error("Invalid webhook timestamp")]
    InvalidTimestamp,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No matching signature")]
    NoMatchingSignature,
}

/// Key bytes for a secret: base64 after `whsec_`, otherwise the raw string
pub fn secret_bytes(secret: &str) -> Vec<u8> {
    match secret.strip_prefix(SECRET_PREFIX) {
        Some(encoded) => BASE64_STANDARD
            .decode(encoded)
            .unwrap_or_else(|_| secret.as_bytes().to_vec()),
        None => secret.as_bytes().to_vec(),
    }
}

/// Sign a payload, returning `v1,{base64-hmac-sha256}`
pub fn sign_payload(msg_id: &str, timestamp: i64, payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(&secret_bytes(secret)).ok()?;
    mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
    mac.update(payload);
    let signature = mac.finalize().into_bytes();

    Some(format!("v1,{}", BASE64_STANDARD.encode(signature)))
}

/// Verify a delivery's headers against its raw body.
///
/// `webhook-signature` may carry several space-separated signatures (e.g. during secret
/// rotation); any matching `v1` entry is accepted.
pub fn verify_webhook(headers: &HeaderMap, payload: &[u8], secret: &str, now: i64) -> Result<(), SignatureError> {
    let msg_id = header(headers, HEADER_ID)?;
    let timestamp: i64 = header(headers, HEADER_TIMESTAMP)?
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    let signatures = header(headers, HEADER_SIGNATURE)?;

    let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
    if skew.is_none_or(|skew| skew > TIMESTAMP_TOLERANCE_SECS.unsigned_abs()) {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let expected = sign_payload(msg_id, timestamp, payload, secret).ok_or(SignatureError::NoMatchingSignature)?;
    let Some(expected_value) = expected.strip_prefix("v1,") else {
        return Err(SignatureError::NoMatchingSignature);
    };

    let matched = signatures
        .split_whitespace()
        .filter_map(|candidate| candidate.strip_prefix("v1,"))
        .any(|value| constant_time_eq(value.as_bytes(), expected_value.as_bytes()));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::NoMatchingSignature)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
