//! Offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Page size when `limit` is omitted.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page a client may request.
pub const MAX_LIMIT: i64 = 100;

/// `?skip=&limit=` query parameters.
///
/// Out-of-range values are clamped rather than rejected: `skip` to at least 0 and `limit` to
/// `1..=MAX_LIMIT`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// `(skip, limit)` after clamping
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// One page of a list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    /// Items matching the query across all pages
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            total_count,
            skip: pagination.skip(),
            limit: pagination.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(skip: Option<i64>, limit: Option<i64>) -> Pagination {
        Pagination { skip, limit }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Pagination::default().params(), (0, DEFAULT_LIMIT));
    }

    #[test]
    fn test_clamping() {
        assert_eq!(page(Some(-3), Some(0)).params(), (0, 1));
        assert_eq!(page(None, Some(-5)).limit(), 1);
        assert_eq!(page(None, Some(1000)).limit(), MAX_LIMIT);
        assert_eq!(page(Some(20), Some(50)).params(), (20, 50));
    }

    #[test]
    fn test_query_values_are_strings() {
        let parsed: Pagination = serde_json::from_value(serde_json::json!({"skip": "5", "limit": "25"})).unwrap();
        assert_eq!(parsed.params(), (5, 25));

        let parsed: Pagination = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(parsed.params(), (0, DEFAULT_LIMIT));
    }
}
