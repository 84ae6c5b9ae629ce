//! Session resolution.
//!
//! Users sign up and log in with the identity provider, which issues HS256 session JWTs. This
//! service never issues tokens to end users; it only resolves a request to a
//! [`CurrentUser`](crate::api::models::users::CurrentUser) or rejects it as unauthenticated.
//!
//! Credentials are read from, in order:
//!
//! 1. `Authorization: Bearer <jwt>`
//! 2. the session cookie (`auth.session.cookie_name`, default `pixctl_session`)
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use pixctl::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.name)
//! }
//! ```
//!
//! # Modules
//!
//! - [`current_user`]: the `CurrentUser` extractor
//! - [`session`]: JWT verification

pub mod current_user;
pub mod session;
