//! Inbound webhook verification.
//!
//! Payment providers deliver events as Standard Webhooks; [`signing`] checks them before any
//! payload is parsed.

pub mod signing;

pub use signing::{SignatureError, sign_payload, verify_webhook};
