//! Offset pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// `skip` and `limit` query parameters.
///
/// Values are clamped rather than rejected: a negative skip becomes 0 and the limit is kept
/// within 1..=100.
// Numbers arrive as strings once this struct is flattened into another query type
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// A page of results plus the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    /// Total number of items matching the filters, ignoring skip and limit
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Pagination::default().params(), (0, DEFAULT_LIMIT));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let p = Pagination {
            skip: Some(-3),
            limit: Some(0),
        };
        assert_eq!(p.params(), (0, 1));

        let p = Pagination {
            skip: Some(40),
            limit: Some(5_000),
        };
        assert_eq!(p.params(), (40, MAX_LIMIT));
    }

    #[test]
    fn test_deserializes_from_query_string() {
        let p: Pagination = serde_urlencoded::from_str("skip=20&limit=50").unwrap();
        assert_eq!(p.params(), (20, 50));

        let p: Pagination = serde_urlencoded::from_str("").unwrap();
        assert_eq!(p.params(), (0, DEFAULT_LIMIT));
    }
}
