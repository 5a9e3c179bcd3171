//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the request/response structures and the JSON envelopes used by the API.

pub mod proposal;
pub mod user;

pub use proposal::*;
pub use user::*;

use crate::error::{validation_error, AppError};
use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;
/// Highest page whose offset still fits an `i64` at the largest limit
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

/// Generic success envelope: `{ success, data, message? }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// List envelope carrying the number of returned items
#[derive(Debug, Serialize)]
pub struct CountedResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> CountedResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Message-only response (no data)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Paginated list envelope: `{ success, data, pagination }`
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: PageRequest, total: i64) -> Self {
        Self {
            success: true,
            data,
            pagination: page.pagination(total),
        }
    }
}

/// One page of a list query. `page` is clamped to 1..=[`MAX_PAGE`], `limit` to 1..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Build from raw query-string values, rejecting anything that is not an integer
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, AppError> {
        let page = parse_query_int("page", page)?.unwrap_or(1);
        let limit = parse_query_int("limit", limit)?.unwrap_or(DEFAULT_PAGE_LIMIT);
        Ok(Self::new(page, limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + self.limit - 1) / self.limit,
        }
    }
}

pub(crate) fn parse_query_int(name: &str, value: Option<&str>) -> Result<Option<i64>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| validation_error(format!("{} must be an integer", name))),
    }
}

pub(crate) fn parse_query_bool(name: &str, value: Option<&str>) -> Result<Option<bool>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(validation_error(format!("{} must be true or false", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 500), PageRequest { page: 3, limit: 100 });
        assert_eq!(PageRequest::new(2, 10).offset(), 10);
    }

    #[test]
    fn test_huge_page_offset_does_not_overflow() {
        let page = PageRequest::new(i64::MAX, MAX_PAGE_LIMIT);
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);
        assert_eq!(PageRequest::parse(Some("9223372036854775807"), Some("100")).unwrap(), page);
    }

    #[test]
    fn test_page_request_parse_defaults_and_errors() {
        assert_eq!(PageRequest::parse(None, None).unwrap(), PageRequest::default());
        assert_eq!(
            PageRequest::parse(Some("2"), Some("25")).unwrap(),
            PageRequest { page: 2, limit: 25 }
        );
        assert!(PageRequest::parse(Some("two"), None).is_err());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PageRequest::new(1, 10);
        assert_eq!(page.pagination(0).total_pages, 0);
        assert_eq!(page.pagination(10).total_pages, 1);
        assert_eq!(page.pagination(11).total_pages, 2);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(PageRequest::new(1, 10).pagination(21)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "page": 1, "limit": 10, "total": 21, "totalPages": 3 })
        );
    }

    #[test]
    fn test_parse_query_bool() {
        assert_eq!(parse_query_bool("published", Some("true")).unwrap(), Some(true));
        assert_eq!(parse_query_bool("published", None).unwrap(), None);
        assert!(parse_query_bool("published", Some("yes")).is_err());
    }
}
