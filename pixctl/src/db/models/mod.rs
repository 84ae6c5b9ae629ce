//! Database record models matching table schemas.
//!
//! These structs correspond to table rows and derive `sqlx::FromRow`. Repositories in
//! [`crate::db::handlers`] return them, and the in-memory stores build the same types so both
//! backends share one vocabulary.
//!
//! - [`users`]: user accounts and their cached credit balance
//! - [`credits`]: the append-only credit transaction log
//! - [`projects`]: uploaded images and their transformation lists

pub mod credits;
pub mod projects;
pub mod users;
