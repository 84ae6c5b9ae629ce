//! Database layer for data persistence and access.
//!
//! Implemented with SQLx over PostgreSQL, following the repository pattern:
//!
//! ```text
//! ┌──────────────────────┐
//! │ ledger / projects    │  (storage traits used by the API)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │ Repositories         │  (db::handlers - queries)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │ Models               │  (db::models - database records)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │ PostgreSQL           │
//! └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories borrow a `PgConnection`. Operations that touch more than one row open a nested
//! transaction on that connection, so a repository can be built from a pooled connection or from
//! an outer transaction:
//!
//! ```ignore
//! let mut conn = pool.acquire().await?;
//! let mut credits = Credits::new(&mut conn);
//! let outcome = credits.debit(&request).await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded with [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
