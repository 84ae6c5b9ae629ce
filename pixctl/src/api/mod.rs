//! REST API: route handlers and their request/response models.
//!
//! Client endpoints live under `/api/v1`:
//!
//! - **Users** (`/users/me/*`): account, balance, debits, transactions
//! - **Projects** (`/projects/*`): projects and their transformations
//! - **Uploads** (`/uploads/auth`): direct upload signatures
//! - **Payments** (`/payments/*`): checkout and customer portal
//!
//! The payment provider posts to `/webhooks/payments`, outside the versioned API. The OpenAPI
//! document is served at `/docs`.

pub mod handlers;
pub mod models;
