//! Axum route handlers, one module per resource.
//!
//! - [`users`]: the signed-in user, credit balance, direct debits and transaction history
//! - [`projects`]: owner-scoped image projects
//! - [`transformations`]: applying and removing AI transformations on a project
//! - [`uploads`]: signed parameters for direct browser uploads
//! - [`payments`]: credit pack checkout, confirmation and the provider webhook
//!
//! Every handler except the webhook takes a [`CurrentUser`](crate::api::models::users::CurrentUser) and returns
//! [`crate::errors::Result`], which renders failures as JSON with a stable reason code.

pub mod payments;
pub mod projects;
pub mod transformations;
pub mod uploads;
pub mod users;
