//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for provisioning a user row.
///
/// Users normally arrive from the identity provider; this request exists for seeding and tests.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub credits: i64,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
