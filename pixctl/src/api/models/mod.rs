//! API request and response data models.
//!
//! API models are kept apart from database models so the wire contract can evolve
//! independently of storage. All of them carry `utoipa` schemas for the generated docs.
//!
//! - [`users`]: the signed-in principal, profile, balance and debit requests
//! - [`transactions`]: credit transaction log entries
//! - [`projects`]: project creation and listing
//! - [`transformations`]: applied transformations and render URLs
//! - [`payments`]: checkout, portal and fulfillment responses
//! - [`pagination`]: shared `skip`/`limit` handling

pub mod pagination;
pub mod payments;
pub mod projects;
pub mod transactions;
pub mod transformations;
pub mod users;
