//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection`, binds parameters for its queries and returns
//! the records from [`crate::db::models`].
//!
//! - [`Users`]: user rows and their cached credit balance
//! - [`Credits`]: the append-only credit transaction log
//! - [`Projects`]: projects and their applied transformations
//!
//! [`Users`] and [`Projects`] implement the shared [`Repository`] trait; [`Credits`] only appends
//! and reads, so it exposes its own balance-changing operations instead.

pub mod credits;
pub mod projects;
pub mod repository;
pub mod users;

pub use credits::Credits;
pub use projects::Projects;
pub use repository::Repository;
pub use users::Users;
